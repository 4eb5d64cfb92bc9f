/// Which representation of a field to use: the stored value, the display
/// value, or both.
///
/// Maps onto `sysparm_display_value` as `false`, `true` and `all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayValue {
    #[default]
    Value,
    Display,
    Both,
}

impl DisplayValue {
    /// The `sysparm_display_value` parameter value.
    pub fn as_param(&self) -> &'static str {
        match self {
            DisplayValue::Value => "false",
            DisplayValue::Display => "true",
            DisplayValue::Both => "all",
        }
    }
}

/// How to turn a row into JSON.
#[derive(Debug, Clone)]
pub struct SerializeOptions {
    pub display_value: DisplayValue,

    /// When false, cells with a reference link nest as `{..., link}`.
    pub exclude_reference_link: bool,

    /// Restrict output to these fields.
    pub fields: Option<Vec<String>>,

    /// Only include cells that report a change.
    pub changes_only: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            display_value: DisplayValue::Value,
            exclude_reference_link: true,
            fields: None,
            changes_only: false,
        }
    }
}

impl SerializeOptions {
    pub fn changes_only() -> Self {
        Self {
            changes_only: true,
            ..Default::default()
        }
    }

    pub fn display_value(mut self, display_value: DisplayValue) -> Self {
        self.display_value = display_value;
        self
    }

    pub fn exclude_reference_link(mut self, exclude: bool) -> Self {
        self.exclude_reference_link = exclude;
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }
}
