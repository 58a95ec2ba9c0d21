pub mod spot;
