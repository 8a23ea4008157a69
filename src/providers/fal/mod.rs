pub mod fal;
