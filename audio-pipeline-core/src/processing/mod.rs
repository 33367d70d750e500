pub mod budget;
pub mod cpu_load;
pub mod levels;
pub mod sample_rate;
