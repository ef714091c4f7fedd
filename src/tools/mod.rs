//! 工具箱：URL 识别、URL 抓取、搜索与注册表

pub mod fetch;
pub mod registry;
pub mod search;
pub mod url;

pub use fetch::{FetchError, WebFetcher, TRUNCATION_MARKER};
pub use registry::{Tool, ToolRegistry};
pub use search::{DuckDuckGoProvider, SearchClient, SearchError, SearchProvider, NO_SEARCH_NEEDED};
pub use url::detect_urls;
