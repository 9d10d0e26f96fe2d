//! User-facing messages returned by the auth surface.

pub const VALIDATION_ERROR: &str = "validation error";

pub const NAME_IS_REQUIRED: &str = "name is required";
pub const NAME_LENGTH: &str = "name length must be from 1 to 100";
pub const EMAIL_IS_REQUIRED: &str = "email is required";
pub const EMAIL_IS_INVALID: &str = "email is invalid";
pub const EMAIL_ALREADY_EXISTS: &str = "email already exists";
pub const PASSWORD_IS_REQUIRED: &str = "password is required";
pub const PASSWORD_LENGTH: &str = "password length must be from 8 to 50";
pub const PASSWORD_MUST_BE_STRONG: &str = "password must be at least 8 characters long and contain at least 1 lowercase letter, 1 uppercase letter, 1 number and 1 symbol";
pub const CONFIRM_PASSWORD_IS_REQUIRED: &str = "confirm password is required";
pub const CONFIRM_PASSWORD_MUST_MATCH: &str = "confirm password must be the same as password";
pub const OLD_PASSWORD_IS_REQUIRED: &str = "old password is required";
pub const OLD_PASSWORD_NOT_MATCH: &str = "old password does not match";
pub const DATE_OF_BIRTH_MUST_BE_ISO8601: &str = "date of birth must be ISO8601";
pub const EMAIL_OR_PASSWORD_IS_INCORRECT: &str = "email or password is incorrect";

pub const ACCESS_TOKEN_IS_REQUIRED: &str = "access token is required";
pub const REFRESH_TOKEN_IS_REQUIRED: &str = "refresh token is required";
pub const REFRESH_TOKEN_IS_INVALID: &str = "refresh token is invalid";
pub const USED_REFRESH_TOKEN_OR_NOT_EXIST: &str = "used or nonexistent refresh token";
pub const EMAIL_VERIFY_TOKEN_IS_REQUIRED: &str = "email verify token is required";
pub const EMAIL_VERIFY_TOKEN_IS_INVALID: &str = "email verify token is invalid";
pub const EMAIL_VERIFY_TOKEN_IS_INCORRECT: &str = "email verify token is incorrect";
pub const FORGOT_PASSWORD_TOKEN_IS_REQUIRED: &str = "forgot password token is required";
pub const FORGOT_PASSWORD_TOKEN_IS_INCORRECT: &str = "forgot password token is incorrect";

pub const USER_NOT_FOUND: &str = "user not found";
pub const USER_IS_NOT_VERIFIED: &str = "user is not verified";
pub const USER_IS_BANNED: &str = "user is banned";
pub const OAUTH_CODE_IS_REQUIRED: &str = "oauth code is required";
pub const GMAIL_NOT_VERIFIED: &str = "gmail not verified";
pub const OAUTH_NOT_CONFIGURED: &str = "oauth provider is not configured";

pub const LOGIN_SUCCESS: &str = "login success";
pub const REGISTER_SUCCESS: &str = "register success";
pub const LOGOUT_SUCCESS: &str = "logout success";
pub const REFRESH_TOKEN_SUCCESS: &str = "refresh token success";
pub const EMAIL_VERIFY_SUCCESS: &str = "email verify success";
pub const EMAIL_ALREADY_VERIFIED_BEFORE: &str = "email already verified before";
pub const RESEND_EMAIL_VERIFY_SUCCESS: &str = "resend email verify success";
pub const CHECK_EMAIL_TO_RESET_PASSWORD: &str = "check email to reset password";
pub const VERIFY_FORGOT_PASSWORD_TOKEN_SUCCESS: &str = "verify forgot password token success";
pub const RESET_PASSWORD_SUCCESS: &str = "reset password success";
pub const CHANGE_PASSWORD_SUCCESS: &str = "change password success";
pub const OAUTH_SUCCESS: &str = "oauth success";
