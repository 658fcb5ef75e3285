pub mod analytics_dto;
pub mod question_dto;
pub mod session_dto;
