use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Department {
    pub(crate) id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) group_name: Option<String>,
    pub(crate) modified_date: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) shifts: Option<Vec<Shift>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Shift {
    pub(crate) id: u8,
    pub(crate) name: String,
}

/// Row of `uspGetManagerEmployees`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Hierarchy {
    pub(crate) id: i32,
    pub(crate) recursion_level: i32,
    pub(crate) organization_node: String,
    pub(crate) manager_first_name: String,
    pub(crate) manager_last_name: String,
    pub(crate) first_name: String,
    pub(crate) last_name: String,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct EmployeeDepartmentHistory {
    pub(crate) business_entity_id: i32,
    pub(crate) department_id: i32,
    pub(crate) shift_id: u8,
}

const STORE_SURVEY_NAMESPACE: &str =
    "http://schemas.microsoft.com/sqlserver/2004/07/adventure-works/StoreSurvey";

// leaf element, with or without attributes, or self-closed
static ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:\w+:)?(\w+)(?:\s[^<>]*?)?(?:/>|>([^<]*)</)")
        .unwrap_or_else(|e| panic!("invalid element regex: {e}"))
});

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#x([0-9A-Fa-f]+)|#([0-9]+)|(lt|gt|amp|quot|apos));")
        .unwrap_or_else(|e| panic!("invalid entity regex: {e}"))
});

/// `Sales.Store.Demographics` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct StoreSurvey {
    pub(crate) annual_sales: i32,
    pub(crate) annual_revenue: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) bank_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) business_type: Option<String>,
    pub(crate) year_opened: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) specialty: Option<String>,
    pub(crate) square_feet: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) brands: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) internet: Option<String>,
    pub(crate) number_employees: i32,
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let code = match (caps.get(1), caps.get(2)) {
                (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
                (_, Some(dec)) => dec.as_str().parse().ok(),
                _ => None,
            };
            if let Some(code) = code {
                return char::from_u32(code).map_or_else(|| caps[0].to_string(), String::from);
            }
            match caps.get(3).map(|m| m.as_str()) {
                Some("lt") => "<".into(),
                Some("gt") => ">".into(),
                Some("amp") => "&".into(),
                Some("quot") => "\"".into(),
                Some("apos") => "'".into(),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

impl StoreSurvey {
    /// Serialize in the `StoreSurvey` schema namespace.
    pub(crate) fn to_xml(&self) -> String {
        let text = |value: &Option<String>| escape(value.as_deref().unwrap_or_default());
        format!(
            "<StoreSurvey xmlns=\"{STORE_SURVEY_NAMESPACE}\">\
             <AnnualSales>{}</AnnualSales>\
             <AnnualRevenue>{}</AnnualRevenue>\
             <BankName>{}</BankName>\
             <BusinessType>{}</BusinessType>\
             <YearOpened>{}</YearOpened>\
             <Specialty>{}</Specialty>\
             <SquareFeet>{}</SquareFeet>\
             <Brands>{}</Brands>\
             <Internet>{}</Internet>\
             <NumberEmployees>{}</NumberEmployees>\
             </StoreSurvey>",
            self.annual_sales,
            self.annual_revenue,
            text(&self.bank_name),
            text(&self.business_type),
            self.year_opened,
            text(&self.specialty),
            self.square_feet,
            text(&self.brands),
            text(&self.internet),
            self.number_employees,
        )
    }

    /// Read the leaf elements of a survey document; unknown elements and
    /// unparsable numbers are skipped. Attributes are ignored, an empty or
    /// self-closed element reads as `""`, and CDATA sections and comments are
    /// not understood.
    pub(crate) fn from_xml(xml: &str) -> Self {
        let mut survey = StoreSurvey::default();
        for caps in ELEMENT.captures_iter(xml) {
            let value = unescape(caps.get(2).map_or("", |m| m.as_str()));
            let number = value.trim().parse::<i32>().ok();
            match &caps[1] {
                "AnnualSales" => survey.annual_sales = number.unwrap_or_default(),
                "AnnualRevenue" => survey.annual_revenue = number.unwrap_or_default(),
                "BankName" => survey.bank_name = Some(value),
                "BusinessType" => survey.business_type = Some(value),
                "YearOpened" => survey.year_opened = number.unwrap_or_default(),
                "Specialty" => survey.specialty = Some(value),
                "SquareFeet" => survey.square_feet = number.unwrap_or_default(),
                "Brands" => survey.brands = Some(value),
                "Internet" => survey.internet = Some(value),
                "NumberEmployees" => survey.number_employees = number.unwrap_or_default(),
                _ => {}
            }
        }
        survey
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMOGRAPHICS: &str = r#"<StoreSurvey xmlns="http://schemas.microsoft.com/sqlserver/2004/07/adventure-works/StoreSurvey"><AnnualSales>800000</AnnualSales><AnnualRevenue>80000</AnnualRevenue><BankName>United Security</BankName><BusinessType>BM</BusinessType><YearOpened>1996</YearOpened><Specialty>Mountain</Specialty><SquareFeet>21000</SquareFeet><Brands>2</Brands><Internet>ISDN</Internet><NumberEmployees>13</NumberEmployees></StoreSurvey>"#;

    #[test]
    fn entities_attributes_and_empty_elements() {
        let xml = r#"<StoreSurvey xmlns="urn:survey"><BankName xml:lang="en">A &amp; B &quot;Trust&quot; &apos;s&#x0D;&#10;</BankName><Specialty /><Brands/><Internet>&amp;lt;</Internet><AnnualSales units="usd">42</AnnualSales></StoreSurvey>"#;
        let survey = StoreSurvey::from_xml(xml);
        assert_eq!(survey.bank_name.as_deref(), Some("A & B \"Trust\" 's\r\n"));
        assert_eq!(survey.specialty.as_deref(), Some(""));
        assert_eq!(survey.brands.as_deref(), Some(""));
        assert_eq!(survey.internet.as_deref(), Some("&lt;"));
        assert_eq!(survey.annual_sales, 42);
        assert_eq!(survey.business_type, None);
    }

    #[test]
    fn parses_server_demographics() {
        let survey = StoreSurvey::from_xml(DEMOGRAPHICS);
        assert_eq!(survey.annual_sales, 800_000);
        assert_eq!(survey.bank_name.as_deref(), Some("United Security"));
        assert_eq!(survey.year_opened, 1996);
        assert_eq!(survey.internet.as_deref(), Some("ISDN"));
        assert_eq!(survey.number_employees, 13);
    }

    #[test]
    fn written_document_reads_back() {
        let survey = StoreSurvey {
            annual_sales: 1_200_000,
            bank_name: Some("Smith & Sons".into()),
            ..StoreSurvey::from_xml(DEMOGRAPHICS)
        };
        let xml = survey.to_xml();
        assert!(xml.contains("Smith &amp; Sons"));
        assert!(xml.starts_with(&format!("<StoreSurvey xmlns=\"{STORE_SURVEY_NAMESPACE}\">")));
        assert_eq!(StoreSurvey::from_xml(&xml), survey);
    }

    #[test]
    fn json_skips_missing_fields() {
        let department = Department {
            id: 17,
            name: Some("Information Technology".into()),
            ..Department::default()
        };
        let json = serde_json::to_value(&department).unwrap();
        assert_eq!(json["Id"], 17);
        assert_eq!(json["Name"], "Information Technology");
        assert!(json.get("GroupName").is_none());
        assert!(json.get("Shifts").is_none());
    }
}
