//! Demo traffic tools for Longhua District, Shenzhen.
//!
//! They return fixed analyses so the full reasoning loop can be shown
//! without a live traffic simulation behind it.

use async_trait::async_trait;
use tracing::debug;

use crate::{Tool, ToolRegistry};

pub const SIMULATION_TOOL: &str = "demo_longhua_simulation";
pub const SOLUTION_TOOL: &str = "demo_longhua_solution";
pub const RESULT_TOOL: &str = "demo_longhua_result";

pub const SIMULATION_REPORT: &str = "It is the peak season for returning to China during the summer vacation. Traffic is very congested at Shenzhen North Station and its surrounding areas in Longhua District, Shenzhen.";

pub const SOLUTION_REPORT: &str =
    "使用长度边权的基于局部搜索的最优路径分配算法实现的协同路径优化方法解决拥堵";

pub const RESULT_REPORT: &str = "When the algorithm was used, simulation results showed that congestion was successfully alleviated.";

/// A tool that always answers with the same report.
struct FixedReport {
    name: &'static str,
    description: &'static str,
    report: &'static str,
}

#[async_trait]
impl Tool for FixedReport {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    async fn execute(&self, input: &str) -> anyhow::Result<String> {
        debug!(tool = self.name, input, "Returning fixed traffic report");
        Ok(self.report.to_string())
    }
}

pub fn simulation() -> Box<dyn Tool> {
    Box::new(FixedReport {
        name: SIMULATION_TOOL,
        description: "When the user wants you to tell him the traffic conditions in Longhua District, Shenzhen, it will return the current analysis of the traffic conditions in Longhua District, Shenzhen.",
        report: SIMULATION_REPORT,
    })
}

pub fn solution() -> Box<dyn Tool> {
    Box::new(FixedReport {
        name: SOLUTION_TOOL,
        description: "When the user wants you to solve the traffic congestion in Longhua District, the following suggestions will be returned",
        report: SOLUTION_REPORT,
    })
}

pub fn result() -> Box<dyn Tool> {
    Box::new(FixedReport {
        name: RESULT_TOOL,
        description: "当用户使用了长度边权的基于局部搜索的最优路径分配算法实现的协同路径优化方法的结果",
        report: RESULT_REPORT,
    })
}

pub fn register_all(registry: &mut ToolRegistry) {
    registry.register(simulation());
    registry.register(solution());
    registry.register(result());
}
