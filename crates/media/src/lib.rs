//! Media store client library.
//!
//! Defines the [`MediaStore`](store::MediaStore) seam used by the
//! generation pipeline and a Cloudinary implementation that uploads
//! assets and destroys them by public id.

pub mod cloudinary;
pub mod store;
