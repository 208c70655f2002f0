//! 工具模块 - 通用工具函数和类型
//!
//! # 内容
//!
//! - [`AppError`] / [`AppResponse`] - 应用错误类型与 API 响应结构
//! - [`time`] - 业务时区时间换算
//! - [`geo`] - 地理围栏距离计算
//! - [`logger`] - 日志初始化

pub mod error;
pub mod geo;
pub mod logger;
pub mod time;

pub use error::{AppError, AppResponse, AppResult, ok};
