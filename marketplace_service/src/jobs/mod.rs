pub mod email_worker;
