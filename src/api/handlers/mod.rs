mod admin;
mod download;
mod upload;

pub use admin::health;
pub use download::download;
pub use upload::{upload, upload_form};
