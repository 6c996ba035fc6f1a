mod string;

pub use string::unquote_string;
