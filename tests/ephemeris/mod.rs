mod interpolation;
mod store;
