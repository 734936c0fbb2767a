//! 工具模块 - logging setup and input validation

pub mod logger;
pub mod validation;
