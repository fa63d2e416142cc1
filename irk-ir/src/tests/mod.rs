mod printer_tests;
mod value_tests;
mod verifier_tests;
