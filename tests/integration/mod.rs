pub mod idle_and_teardown;
