//! ReAct prompt construction.

use traffic_sense_tools::ToolRegistry;

/// Persona used when the config does not provide one.
pub const DEFAULT_PREFIX: &str = "\
[WHO ARE YOU]
You are a AI to assist human with traffic simulation control, making traffic and transportation decisions, or providing traffic analysis reports. Although you have access to a set of tools, your abilities are not limited to the tools at your disposal.
[YOUR ACTION GUIDELINES]
1. You need to determine whether the human message is a traffic simulation control command or a question before making any move. If it is a traffic simulation control command, just execute the command and don't do any further information analysis.
2. You need to remember the human message exactly. Your only purpose is to complete the task that is explicitly expressed in the human message.
3. Whenever you are about to come up with a thought, recall the human message to check if you already have enough information for the final answer. If so, you shouldn't infer or fabricate any more needs or questions based on your own ideas.
4. Remember what tools you have used, DO NOT use the same tool repeatedly. Try to use the least amount of tools.
5. If you can not find any appropriate tool for your task, try to do it using your own ability and knowledge as a chat AI.
6. When you encounter tabular content in Observation, make sure you output the tabular content in markdown format into your final answer.
7. When you realize that existing tools are not solving the problem at hand, you need to end your actions and ask the human for more information as your final answer.
[THINGS YOU CANNOT DO]
You are forbidden to fabricate any tool names.
You are forbidden to fabricate any input parameters when calling tools!";

const FORMAT_INSTRUCTIONS: &str = "\
Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do as a traffic expert. Consider:
- What traffic data or analysis is needed?
- What is the logical sequence of actions?
- Do I need current status before optimization?
- Should I verify results after changes?
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question";

const PRACTICES: &str = "\
🔍 交通分析最佳实践：
- 分析前先获取当前状态
- 优化前必须了解问题所在
- 优化后要验证改进效果
- 报告中要包含数据支撑和文件路径";

/// Stop generating before the model invents its own observation.
pub const STOP_SEQUENCE: &str = "\nObservation:";

/// Build the prompt up to the point where the model continues with a thought.
///
/// The returned text ends in `Thought:`; the scratchpad of earlier steps is
/// appended after it by the engine.
pub fn build_react_prompt(
    prefix: &str,
    tools: &ToolRegistry,
    history: &str,
    question: &str,
) -> String {
    let mut parts = vec![prefix.trim().to_string()];
    parts.push("🚦 作为交通分析专家，请遵循以下推理模式：".to_string());
    parts.push(format!(
        "You have access to the following tools:\n{}",
        tools.describe()
    ));
    parts.push(FORMAT_INSTRUCTIONS.replace("{tool_names}", &tools.list().join(", ")));
    parts.push(PRACTICES.to_string());

    let mut begin = String::from("Begin!\n");
    if !history.trim().is_empty() {
        begin.push_str(&format!("\nPrevious conversation:\n{}\n", history.trim_end()));
    }
    begin.push_str(&format!("\nQuestion: {question}\nThought:"));
    parts.push(begin);

    parts.join("\n\n")
}
