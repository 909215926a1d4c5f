//! HTML form parsing and submission.
//!
//! The catalog is an ASP.NET WebForms site: every POST must carry the
//! complete set of hidden state fields (`__VIEWSTATE` and friends) from the
//! page it was issued on, plus the name of the button that was "clicked".

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// A radio button belonging to a form
#[derive(Debug, Clone, PartialEq, Eq)]
struct RadioOption {
    name: String,
    value: String,
}

/// A form scraped from a page, ready to be filled and submitted
#[derive(Debug, Clone)]
pub struct HtmlForm {
    name: String,
    action: Url,
    /// Successful controls in document order
    fields: Vec<(String, String)>,
    radios: Vec<RadioOption>,
    /// Submit controls, only sent when clicked
    buttons: Vec<(String, String)>,
}

impl HtmlForm {
    /// Find the form named (or with id) `name` on a page served from `page_url`
    pub fn find(html: &Html, page_url: &Url, name: &str) -> Option<Self> {
        let selector =
            Selector::parse(&format!(r#"form[name="{name}"], form[id="{name}"]"#)).ok()?;
        let form = html.select(&selector).next()?;

        let action = match form.value().attr("action") {
            Some(a) if !a.trim().is_empty() => page_url.join(a.trim()).ok()?,
            _ => page_url.clone(),
        };

        let mut parsed = Self {
            name: name.to_string(),
            action,
            fields: Vec::new(),
            radios: Vec::new(),
            buttons: Vec::new(),
        };
        parsed.collect_controls(form);
        Some(parsed)
    }

    fn collect_controls(&mut self, form: ElementRef<'_>) {
        let control_sel = Selector::parse("input, select, textarea, button")
            .expect("static selector is valid");
        let option_sel = Selector::parse("option").expect("static selector is valid");

        for control in form.select(&control_sel) {
            let element = control.value();
            let name = match element.attr("name") {
                Some(n) if !n.is_empty() => n.to_string(),
                _ => continue,
            };
            if element.attr("disabled").is_some() {
                continue;
            }

            match element.name() {
                "input" => {
                    let input_type = element.attr("type").unwrap_or("text").to_lowercase();
                    let value = element.attr("value").unwrap_or_default().to_string();
                    match input_type.as_str() {
                        "submit" | "image" | "button" => self.buttons.push((name, value)),
                        "reset" | "file" => {}
                        "radio" => {
                            if element.attr("checked").is_some() {
                                self.fields.push((name.clone(), value.clone()));
                            }
                            self.radios.push(RadioOption { name, value });
                        }
                        "checkbox" => {
                            if element.attr("checked").is_some() {
                                let value = if value.is_empty() { "on".to_string() } else { value };
                                self.fields.push((name, value));
                            }
                        }
                        _ => self.fields.push((name, value)),
                    }
                }
                "select" => {
                    let options: Vec<ElementRef<'_>> = control.select(&option_sel).collect();
                    let chosen = options
                        .iter()
                        .find(|o| o.value().attr("selected").is_some())
                        .or_else(|| options.first());
                    if let Some(option) = chosen {
                        let value = option
                            .value()
                            .attr("value")
                            .map(str::to_string)
                            .unwrap_or_else(|| option.text().collect::<String>().trim().to_string());
                        self.fields.push((name, value));
                    }
                }
                "textarea" => {
                    self.fields.push((name, control.text().collect()));
                }
                "button" => {
                    let button_type = element.attr("type").unwrap_or("submit").to_lowercase();
                    if button_type == "submit" {
                        let value = element.attr("value").unwrap_or_default().to_string();
                        self.buttons.push((name, value));
                    }
                }
                _ => {}
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute URL the form posts to
    pub fn action(&self) -> &Url {
        &self.action
    }

    /// Current value of a field
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set a field, adding it if the page did not render it
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some(existing) => existing.1 = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    /// Check the radio button whose value is `value`; false if no such radio exists
    pub fn check_radio(&mut self, value: &str) -> bool {
        let Some(radio) = self.radios.iter().find(|r| r.value == value).cloned() else {
            return false;
        };
        self.set(&radio.name, radio.value);
        true
    }

    /// Drop any of `names` whose value is blank so they are not posted at all
    pub fn omit_blank(&mut self, names: &[&str]) {
        self.fields
            .retain(|(n, v)| !(v.trim().is_empty() && names.contains(&n.as_str())));
    }

    pub fn has_button(&self, name: &str) -> bool {
        self.buttons.iter().any(|(n, _)| n == name)
    }

    /// Fields to POST when `button` is clicked; `None` if the form has no such button
    pub fn submission(&self, button: &str) -> Option<Vec<(String, String)>> {
        let clicked = self.buttons.iter().find(|(n, _)| n == button)?;
        let mut params = self.fields.clone();
        params.push(clicked.clone());
        Some(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> Url {
        Url::parse("https://catalog.test/advanced.aspx").unwrap()
    }

    const FORM_HTML: &str = r#"
        <html><body>
        <form name="other"><input name="ignored" value="x"></form>
        <form name="aspnetForm" method="post" action="./advanced.aspx?lang=en">
            <input type="hidden" name="__VIEWSTATE" value="dDwxNTc">
            <input type="hidden" name="__EVENTVALIDATION" value="ev123">
            <input type="text" name="ctl00$txtTitle" value="">
            <input type="text" name="ctl00$txtAuthor">
            <input type="checkbox" name="ctl00$chkFiction" checked>
            <input type="checkbox" name="ctl00$chkNonFiction" value="yes">
            <input type="radio" name="usertype" value="radStudent" checked>
            <input type="radio" name="usertype" value="radParent">
            <input type="text" name="ctl00$disabled" value="nope" disabled>
            <select name="ctl00$ddlSort">
                <option value="Relevance">Relevance</option>
                <option value="Title" selected>Title</option>
            </select>
            <select name="ctl00$ddlQuiz"><option>Any</option></select>
            <textarea name="ctl00$notes">hello</textarea>
            <input type="submit" name="ctl00$btnDoIt" value="Search">
            <button name="ctl00$btnReset" type="reset">Reset</button>
            <button name="ctl00$btnGo">Go</button>
        </form>
        </body></html>
    "#;

    fn parse() -> HtmlForm {
        let html = Html::parse_document(FORM_HTML);
        HtmlForm::find(&html, &page_url(), "aspnetForm").expect("form present")
    }

    #[test]
    fn test_find_resolves_action() {
        let form = parse();
        assert_eq!(form.name(), "aspnetForm");
        assert_eq!(
            form.action().as_str(),
            "https://catalog.test/advanced.aspx?lang=en"
        );
    }

    #[test]
    fn test_missing_form() {
        let html = Html::parse_document(FORM_HTML);
        assert!(HtmlForm::find(&html, &page_url(), "form1").is_none());
    }

    #[test]
    fn test_hidden_state_is_round_tripped() {
        let form = parse();
        assert_eq!(form.field("__VIEWSTATE"), Some("dDwxNTc"));
        assert_eq!(form.field("__EVENTVALIDATION"), Some("ev123"));
        assert_eq!(form.field("ctl00$txtAuthor"), Some(""));
    }

    #[test]
    fn test_checked_controls_only() {
        let form = parse();
        assert_eq!(form.field("ctl00$chkFiction"), Some("on"));
        assert_eq!(form.field("ctl00$chkNonFiction"), None);
        assert_eq!(form.field("usertype"), Some("radStudent"));
        assert_eq!(form.field("ctl00$disabled"), None);
    }

    #[test]
    fn test_select_and_textarea() {
        let form = parse();
        assert_eq!(form.field("ctl00$ddlSort"), Some("Title"));
        assert_eq!(form.field("ctl00$ddlQuiz"), Some("Any"));
        assert_eq!(form.field("ctl00$notes"), Some("hello"));
    }

    #[test]
    fn test_check_radio() {
        let mut form = parse();
        assert!(form.check_radio("radParent"));
        assert_eq!(form.field("usertype"), Some("radParent"));
        assert!(!form.check_radio("radTeacher"));
    }

    #[test]
    fn test_set_replaces_or_appends() {
        let mut form = parse();
        form.set("ctl00$txtTitle", "Matilda");
        form.set("ctl00$txtSeries", "Dahl");
        assert_eq!(form.field("ctl00$txtTitle"), Some("Matilda"));
        assert_eq!(form.field("ctl00$txtSeries"), Some("Dahl"));
    }

    #[test]
    fn test_omit_blank_keeps_filled_and_hidden_fields() {
        let mut form = parse();
        form.set("ctl00$txtTitle", "Matilda");
        form.omit_blank(&["ctl00$txtTitle", "ctl00$txtAuthor", "__VIEWSTATE"]);

        let params = form.submission("ctl00$btnDoIt").unwrap();
        let names: Vec<&str> = params.iter().map(|(n, _)| n.as_str()).collect();
        assert!(names.contains(&"ctl00$txtTitle"));
        assert!(names.contains(&"__VIEWSTATE"));
        assert!(names.contains(&"__EVENTVALIDATION"));
        assert!(!names.contains(&"ctl00$txtAuthor"));
    }

    #[test]
    fn test_submission_includes_clicked_button_only() {
        let form = parse();
        assert!(form.has_button("ctl00$btnDoIt"));
        assert!(form.has_button("ctl00$btnGo"));
        assert!(!form.has_button("ctl00$btnReset"));

        let params = form.submission("ctl00$btnDoIt").unwrap();
        assert!(params.contains(&("ctl00$btnDoIt".to_string(), "Search".to_string())));
        assert!(!params.iter().any(|(n, _)| n == "ctl00$btnGo"));
        assert!(form.submission("ctl00$btnMissing").is_none());
    }
}
