pub mod analytics_service;
pub mod evaluator;
pub mod question_service;
pub mod results;
pub mod selector_service;
pub mod session_service;
pub mod timing;
