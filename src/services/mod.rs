pub mod codegen;
pub mod http;
pub mod link_service;
pub mod resolver;

pub use codegen::CodeGenerator;
pub use http::{api_routes, redirect_routes, LinkApi, RedirectService};
pub use link_service::{CreateLinkRequest, LinkService};
pub use resolver::Resolver;
