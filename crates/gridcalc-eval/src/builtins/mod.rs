pub mod aggregate;
pub mod datetime;
pub mod info;
pub mod logical;
pub mod math;
pub mod random;
mod utils;

pub fn load_builtins() {
    aggregate::register_builtins();
    datetime::register_builtins();
    info::register_builtins();
    logical::register_builtins();
    math::register_builtins();
    random::register_builtins();
}
