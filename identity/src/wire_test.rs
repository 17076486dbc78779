use super::*;
use crate::Role;

#[test]
fn change_password_uses_camel_case_keys() {
    let body = ChangePasswordRequest { current_password: "Old1!aaaa".into(), new_password: "New1!aaaa".into() };
    let value = serde_json::to_value(&body).unwrap();
    assert_eq!(value["currentPassword"], "Old1!aaaa");
    assert_eq!(value["newPassword"], "New1!aaaa");
}

#[test]
fn reset_password_omits_absent_email() {
    let body = ResetPasswordRequest { email: None, otp: "ABC234".into(), new_password: "Abcdef1!".into() };
    let value = serde_json::to_value(&body).unwrap();
    assert!(value.get("email").is_none());
    assert_eq!(value["otp"], "ABC234");
}

#[test]
fn login_response_decodes_provider_user_document() {
    let json = r#"{"token":"t-1","user":{"email":"new@x.com","role":"user","_id":"1"}}"#;
    let resp: LoginResponse = serde_json::from_str(json).unwrap();
    assert_eq!(resp.token, "t-1");
    assert_eq!(resp.user.role, Role::User);
}

#[test]
fn forgot_password_response_without_otp() {
    let resp: ForgotPasswordResponse = serde_json::from_str(r#"{"message":"otp-sent"}"#).unwrap();
    assert!(resp.otp.is_none());
}

#[test]
fn register_request_accepts_missing_name() {
    let req: RegisterRequest = serde_json::from_str(r#"{"email":"a@b.com","password":"p"}"#).unwrap();
    assert!(req.name.is_none());
}
