pub mod authorization_request;
pub mod credential_format;
pub mod dcql_query;
pub mod input_descriptor;
pub mod metadata;
pub mod object;
pub mod presentation_definition;
pub mod response;
pub mod util;
