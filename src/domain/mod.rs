//! 领域层
//!
//! 服务与插件的能力接口定义，容器和插件管理器只依赖这些抽象。

pub mod interfaces;
