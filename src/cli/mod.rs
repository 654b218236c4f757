pub mod cli;
pub mod run;

mod run_cleanup;
mod run_list_customers;
mod run_send_discount;
mod run_send_test_email;
mod run_server;
mod show_statistics;
