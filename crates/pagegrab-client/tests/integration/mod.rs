mod grab_tests;
mod relay_tests;
