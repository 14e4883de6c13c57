mod api;
pub mod models;
pub use api::{
    StatusError, build_generate_body, convert_body_parts_gemini,
    convert_messages_to_gemini_contents, list_models, parse_generate_response,
    response_to_text_data, send_generate_request,
};
