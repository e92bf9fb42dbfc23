pub mod cloudinary_uploader;
pub mod razorpay_gateway;
pub mod smtp_mailer;
