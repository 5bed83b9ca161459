mod admission;
mod persistence;
