pub mod listings;
pub mod llm_http;

pub use listings::DatasetListings;
pub use llm_http::HttpLlmClient;
