pub mod assembler;
pub mod export;
pub mod request;

pub use assembler::{
    assemble, assemble_value, Opportunity, Report, ReportSnapshot, StarterPrompt, Strength,
};
pub use request::{
    report_schema, system_instruction, user_content, validate_schema, ReportRequest,
    ReportRequestBuilder, REQUIRED_REPORT_FIELDS, SYSTEM_INSTRUCTION_VERSION,
};
