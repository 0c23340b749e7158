pub mod assertion;
pub mod jwks;
pub mod middleware;
pub mod tokens;
