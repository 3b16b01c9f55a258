pub mod app;
pub mod arff;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod http;
pub mod kaggle;
pub mod openml;
pub mod output;
pub mod table;
