// Core vocabulary shared by the client and the models: errors, enums, identifiers.
pub mod enums;
pub mod error;
pub mod ident;
