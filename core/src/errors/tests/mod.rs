mod key_error_tests;
