mod conic;
mod precision;
