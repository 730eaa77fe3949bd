mod config;
mod frames;
