use thiserror::Error;

/// Everything the discount email needs, passed in explicitly. The renderer
/// has no access to settings or ambient state.
#[derive(Debug, Clone)]
pub struct TemplateData {
    pub coupon_code: String,
    pub first_name: String,
    pub last_name: String,
    pub discount_percent: u32,
    pub expiry_date: String,
    pub shop_name: String,
    pub logo_data_uri: Option<String>,
}

/// Placeholders every template must contain.
pub const REQUIRED_PLACEHOLDERS: [&str; 3] = ["{coupon_code}", "{first_name}", "{last_name}"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("required placeholder {0} missing from template")]
pub struct MissingPlaceholder(pub &'static str);

pub const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
</head>
<body style="margin: 0; padding: 0; background-color: #f4f4f4; font-family: Arial, sans-serif;">
  <table role="presentation" width="100%" cellpadding="0" cellspacing="0">
    <tr>
      <td align="center" style="padding: 24px;">
        <table role="presentation" width="600" cellpadding="0" cellspacing="0" style="background-color: #ffffff; border-radius: 8px; padding: 32px;">
          <tr><td align="center">{logo}</td></tr>
          <tr>
            <td style="padding-top: 16px;">
              <h1 style="font-size: 22px; color: #222222;">Welcome to {shop_name}, {first_name} {last_name}!</h1>
              <p style="font-size: 15px; color: #444444;">
                As a thank-you for your first order, here is a personal
                {discount_percent}% discount for your next purchase:
              </p>
              <p align="center" style="font-size: 28px; letter-spacing: 3px; font-weight: bold; color: #111111; background-color: #f0f0f0; padding: 16px; border-radius: 4px;">
                {coupon_code}
              </p>
              <p style="font-size: 13px; color: #777777;">
                The code can be used once, only with your email address, and
                is valid until {expiry_date}.
              </p>
            </td>
          </tr>
        </table>
      </td>
    </tr>
  </table>
</body>
</html>
"#;

/// Rejects templates missing any of the required placeholders.
pub fn validate_template(content: &str) -> Result<(), MissingPlaceholder> {
    if content.trim().is_empty() {
        return Err(MissingPlaceholder(REQUIRED_PLACEHOLDERS[0]));
    }
    for placeholder in REQUIRED_PLACEHOLDERS {
        if !content.contains(placeholder) {
            return Err(MissingPlaceholder(placeholder));
        }
    }
    Ok(())
}

pub fn render(template: &str, data: &TemplateData) -> String {
    let logo = match &data.logo_data_uri {
        Some(uri) => format!(
            r#"<img src="{}" alt="{}" style="max-width: 200px; max-height: 80px;">"#,
            uri, data.shop_name
        ),
        None => String::new(),
    };

    template
        .replace("{coupon_code}", &data.coupon_code)
        .replace("{first_name}", &data.first_name)
        .replace("{last_name}", &data.last_name)
        .replace("{discount_percent}", &data.discount_percent.to_string())
        .replace("{expiry_date}", &data.expiry_date)
        .replace("{shop_name}", &data.shop_name)
        .replace("{logo}", &logo)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> TemplateData {
        TemplateData {
            coupon_code: "NL123ABC".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            discount_percent: 20,
            expiry_date: "2026-09-04".to_string(),
            shop_name: "Example Shop".to_string(),
            logo_data_uri: None,
        }
    }

    #[test]
    fn default_template_passes_validation() {
        validate_template(DEFAULT_TEMPLATE).unwrap();
    }

    #[test]
    fn render_substitutes_all_placeholders() {
        let html = render(DEFAULT_TEMPLATE, &sample_data());
        assert!(html.contains("NL123ABC"));
        assert!(html.contains("Jane"));
        assert!(html.contains("20%"));
        assert!(html.contains("2026-09-04"));
        assert!(!html.contains("{coupon_code}"));
        assert!(!html.contains("{logo}"));
    }

    #[test]
    fn logo_renders_as_inline_image_when_present() {
        let mut data = sample_data();
        data.logo_data_uri = Some("data:image/png;base64,AAAA".to_string());
        let html = render(DEFAULT_TEMPLATE, &data);
        assert!(html.contains(r#"<img src="data:image/png;base64,AAAA""#));
    }

    #[test]
    fn validation_names_the_missing_placeholder() {
        let err = validate_template("<p>{first_name} {last_name}</p>").unwrap_err();
        assert_eq!(err, MissingPlaceholder("{coupon_code}"));

        assert!(validate_template("").is_err());
    }
}
