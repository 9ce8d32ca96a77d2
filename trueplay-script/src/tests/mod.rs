mod interpreter_tests;
mod lexer_tests;
