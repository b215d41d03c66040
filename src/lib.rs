//! sitepipe - static site asset pipeline
//!
//! This library provides functionality to:
//! - Compile Sass, modern JavaScript and Handlebars pages into a temp tree
//! - Resolve bundle markers in pages into concatenated, minified assets
//! - Optimize images and copy fonts and public files into the output root
//! - Serve the site with file watching and live reload, or preview the bundle

pub mod build;
pub mod cli;
pub mod config;
pub mod mode;
pub mod server;
pub mod transforms;
pub mod watch;
