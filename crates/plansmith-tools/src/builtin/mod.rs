pub mod calculator;
pub mod news;
