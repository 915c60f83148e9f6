//! 认知层：响应协议解析与编排主循环

pub mod loop_;
pub mod parser;

pub use loop_::{react_loop, ReactSession, DEFAULT_MAX_TURNS};
pub use parser::{parse_response, ParsedResponse, PARSE_ERROR_TOOL_NAME, TERMINATE_MARKER};
