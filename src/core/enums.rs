//! Purpose: Closed, string-valued option sets used by KE-chain payloads.
//! Exports: One enum per option set plus `WidgetType::from_discriminator`.
//! Role: Validation and branching vocabulary for models, queries, and the CLI.
//! Invariants: `as_str` returns the exact wire value; `parse` is its inverse.
//! Invariants: `values()` is sorted so listings are deterministic.
use super::error::{Error, ErrorKind};
use std::fmt;
use std::str::FromStr;

/// Declares an enum whose variants map one-to-one onto wire strings.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $value:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[ $( $name::$variant ),+ ];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $value ),+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $( $value => Some($name::$variant), )+
                    _ => None,
                }
            }

            pub fn values() -> Vec<&'static str> {
                let mut values: Vec<_> = Self::ALL.iter().map(|item| item.as_str()).collect();
                values.sort_unstable();
                values
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Self::parse(value).ok_or_else(|| {
                    Error::new(ErrorKind::IllegalArgument).with_message(format!(
                        "'{value}' is not a valid {}; expected one of {}",
                        stringify!($name),
                        Self::values().join(", ")
                    ))
                })
            }
        }
    };
}

string_enum! {
    pub enum Multiplicity {
        ZeroOne => "ZERO_ONE",
        One => "ONE",
        ZeroMany => "ZERO_MANY",
        OneMany => "ONE_MANY",
    }
}

string_enum! {
    /// Template (`Model`) versus concrete occurrence (`Instance`).
    pub enum Category {
        Instance => "INSTANCE",
        Model => "MODEL",
    }
}

string_enum! {
    pub enum Classification {
        Product => "PRODUCT",
        Catalog => "CATALOG",
    }
}

string_enum! {
    /// Discriminator of a property payload.
    pub enum PropertyType {
        CharValue => "CHAR_VALUE",
        TextValue => "TEXT_VALUE",
        BooleanValue => "BOOLEAN_VALUE",
        IntValue => "INT_VALUE",
        FloatValue => "FLOAT_VALUE",
        DatetimeValue => "DATETIME_VALUE",
        AttachmentValue => "ATTACHMENT_VALUE",
        LinkValue => "LINK_VALUE",
        SingleSelectValue => "SINGLE_SELECT_VALUE",
        ReferenceValue => "REFERENCE_VALUE",
        ReferencesValue => "REFERENCES_VALUE",
    }
}

impl PropertyType {
    pub fn is_reference(self) -> bool {
        matches!(self, PropertyType::ReferenceValue | PropertyType::ReferencesValue)
    }
}

string_enum! {
    pub enum ActivityType {
        Process => "PROCESS",
        Task => "TASK",
        UserTask => "UserTask",
        ServiceTask => "ServiceTask",
        Subprocess => "Subprocess",
    }
}

impl ActivityType {
    /// Counterpart of this type in the other workflow model generation.
    pub fn wim_compatible(self) -> Option<ActivityType> {
        match self {
            ActivityType::UserTask => Some(ActivityType::Task),
            ActivityType::Subprocess => Some(ActivityType::Process),
            ActivityType::Process => Some(ActivityType::Subprocess),
            ActivityType::Task => Some(ActivityType::UserTask),
            ActivityType::ServiceTask => None,
        }
    }

    pub fn is_container(self) -> bool {
        matches!(self, ActivityType::Process | ActivityType::Subprocess)
    }
}

string_enum! {
    pub enum ActivityClassification {
        Workflow => "WORKFLOW",
        Catalog => "CATALOG",
    }
}

string_enum! {
    pub enum ActivityStatus {
        Open => "OPEN",
        Completed => "COMPLETED",
    }
}

string_enum! {
    pub enum ScopeStatus {
        Active => "ACTIVE",
        Closed => "CLOSED",
        Template => "TEMPLATE",
        Deleting => "DELETING",
    }
}

string_enum! {
    pub enum ScopeCategory {
        LibraryScope => "LIBRARY_SCOPE",
        UserScope => "USER_SCOPE",
        TemplateScope => "TEMPLATE_SCOPE",
    }
}

string_enum! {
    pub enum ServiceType {
        PythonScript => "PYTHON SCRIPT",
        Notebook => "NOTEBOOK",
    }
}

string_enum! {
    pub enum ServiceEnvironmentVersion {
        Python27 => "2.7",
        Python35 => "3.5",
        Python36 => "3.6",
        Python35Notebooks => "3.5_notebook",
        Python36Notebooks => "3.6_notebook",
    }
}

string_enum! {
    pub enum ServiceScriptUser {
        KenodeUser => "kenode",
        ConfiguratorUser => "kenode_configurator",
    }
}

string_enum! {
    pub enum ServiceExecutionStatus {
        Loading => "LOADING",
        Running => "RUNNING",
        Completed => "COMPLETED",
        Failed => "FAILED",
        Terminating => "TERMINATING",
        Terminated => "TERMINATED",
    }
}

impl ServiceExecutionStatus {
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            ServiceExecutionStatus::Completed
                | ServiceExecutionStatus::Failed
                | ServiceExecutionStatus::Terminated
        )
    }
}

string_enum! {
    pub enum TeamRole {
        Member => "MEMBER",
        Manager => "MANAGER",
        Owner => "OWNER",
    }
}

string_enum! {
    /// Comparison operator of a reference pre-filter.
    pub enum FilterType {
        GreaterThanEqual => "gte",
        LowerThanEqual => "lte",
        Contains => "icontains",
        Exact => "exact",
    }
}

string_enum! {
    pub enum SortTable {
        Ascending => "ASC",
        Descending => "DESC",
    }
}

string_enum! {
    /// Discriminator of a widget payload. `Undefined` is the fallback variant.
    pub enum WidgetType {
        Undefined => "UNDEFINED",
        PropertyGrid => "PROPERTYGRID",
        SuperGrid => "SUPERGRID",
        Html => "HTML",
        FilteredGrid => "FILTEREDGRID",
        Service => "SERVICE",
        Notebook => "NOTEBOOK",
        AttachmentViewer => "ATTACHMENTVIEWER",
        TaskNavigationBar => "TASKNAVIGATIONBAR",
        Json => "JSON",
        MetaPanel => "METAPANEL",
        MultiColumn => "MULTICOLUMN",
        Scope => "SCOPE",
        ThirdParty => "THIRDPARTY",
        Progress => "PROGRESS",
        Signature => "SIGNATURE",
        Card => "CARD",
    }
}

/// Widget names used by older activity customizations, mapped to their types.
const LEGACY_WIDGET_NAMES: &[(&str, WidgetType)] = &[
    ("superGridWidget", WidgetType::SuperGrid),
    ("propertyGridWidget", WidgetType::PropertyGrid),
    ("htmlWidget", WidgetType::Html),
    ("filteredGridWidget", WidgetType::FilteredGrid),
    ("serviceWidget", WidgetType::Service),
    ("notebookWidget", WidgetType::Notebook),
    ("attachmentViewerWidget", WidgetType::AttachmentViewer),
    ("taskNavigationBarWidget", WidgetType::TaskNavigationBar),
    ("jsonWidget", WidgetType::Json),
    ("metaPanelWidget", WidgetType::MetaPanel),
    ("multiColumnWidget", WidgetType::MultiColumn),
    ("progressWidget", WidgetType::Progress),
    ("signatureWidget", WidgetType::Signature),
    ("cardWidget", WidgetType::Card),
];

impl WidgetType {
    /// Resolves a payload discriminator; never fails.
    ///
    /// Matching ignores ASCII case (`superGrid` and `SUPERGRID` are the same
    /// type). Legacy widget names are accepted as explicit aliases. A missing
    /// or unknown discriminator resolves to `Undefined`.
    pub fn from_discriminator(discriminator: Option<&str>) -> WidgetType {
        let Some(raw) = discriminator else {
            return WidgetType::Undefined;
        };
        let raw = raw.trim();
        if let Some(found) = WidgetType::ALL
            .iter()
            .copied()
            .find(|candidate| candidate.as_str().eq_ignore_ascii_case(raw))
        {
            return found;
        }
        LEGACY_WIDGET_NAMES
            .iter()
            .find(|(name, _)| *name == raw)
            .map(|(_, widget_type)| *widget_type)
            .unwrap_or(WidgetType::Undefined)
    }

    pub fn legacy_name(self) -> Option<&'static str> {
        LEGACY_WIDGET_NAMES
            .iter()
            .find(|(_, widget_type)| *widget_type == self)
            .map(|(name, _)| *name)
    }
}

string_enum! {
    pub enum ActivityRootNames {
        WorkflowRoot => "WORKFLOW_ROOT",
        CatalogRoot => "CATALOG_ROOT",
    }
}

string_enum! {
    /// Inspector component types of a legacy customized task.
    pub enum ComponentXType {
        Panel => "panel",
        Toolbar => "toolbar",
        PropertyGrid => "propertyGrid",
        SuperGrid => "superGrid",
        PaginatedSuperGrid => "paginatedSuperGrid",
        FilteredGrid => "filteredGrid",
        DisplayField => "displayfield",
        PropertyAttachmentPreviewer => "propertyAttachmentViewer",
        HtmlPanel => "htmlPanel",
        ExecuteService => "executeService",
        NotebookPanel => "notebookPanel",
        ActivityNavigationBar => "activityNavigationBar",
        Button => "button",
        ModelViewer => "modelViewer",
        CsvGrid => "csvGrid",
        JsonTree => "jsonTree",
    }
}

string_enum! {
    /// Environment variables read by `ClientConfig::from_env` and `get_project`.
    pub enum KechainEnv {
        ForceEnvUse => "KECHAIN_FORCE_ENV_USE",
        Url => "KECHAIN_URL",
        Token => "KECHAIN_TOKEN",
        Username => "KECHAIN_USERNAME",
        Password => "KECHAIN_PASSWORD",
        Scope => "KECHAIN_SCOPE",
        ScopeId => "KECHAIN_SCOPE_ID",
        ScopeStatus => "KECHAIN_SCOPE_STATUS",
        CheckCertificates => "KECHAIN_CHECK_CERTIFICATES",
    }
}

string_enum! {
    /// `Start` is the KE-chain 2 spelling of `Left`.
    pub enum NavigationBarAlignment {
        Center => "center",
        Start => "start",
        Left => "left",
        Right => "right",
    }
}

string_enum! {
    pub enum PaperSize {
        A0 => "a0paper",
        A1 => "a1paper",
        A2 => "a2paper",
        A3 => "a3paper",
        A4 => "a4paper",
    }
}

string_enum! {
    pub enum PaperOrientation {
        Portrait => "portrait",
        Landscape => "landscape",
    }
}

string_enum! {
    /// Validator kinds a property may carry in its value options.
    pub enum PropertyVTypes {
        NoneValidator => "noneValidator",
        NumericRange => "numericRangeValidator",
        BooleanField => "booleanFieldValidator",
        RequiredField => "requiredFieldValidator",
        EvenNumber => "evenNumberValidator",
        OddNumber => "oddNumberValidator",
        RegexString => "regexStringValidator",
        SingleReference => "singleReferenceValidator",
    }
}

string_enum! {
    pub enum ValidatorEffectTypes {
        NoneEffect => "noneEffect",
        VisualEffect => "visualEffect",
        TextEffect => "textEffect",
        ErrorTextEffect => "errorTextEffect",
        HelpTextEffect => "helpTextEffect",
    }
}

string_enum! {
    pub enum PropertyRepresentation {
        DecimalPlaces => "decimalPlaces",
        SignificantDigits => "significantDigits",
        LinkTarget => "linkTarget",
    }
}

string_enum! {
    /// Extra columns of a property grid widget.
    pub enum ShowColumnTypes {
        Unit => "unit",
        Description => "description",
    }
}

string_enum! {
    pub enum ScopeWidgetColumnTypes {
        ProjectName => "Project Name",
        StartDate => "Start date",
        DueDate => "Due date",
        Progress => "Progress",
        Status => "Status",
    }
}

string_enum! {
    pub enum ProgressBarColors {
        Black => "#000000",
        White => "#FFFFFF",
        Red => "#FF0000",
        Lime => "#00FF00",
        Blue => "#0000FF",
        Yellow => "#FFFF00",
        Cyan => "#00FFFF",
        Magenta => "#FF00FF",
        Silver => "#C0C0C0",
        Gray => "#808080",
        Maroon => "#800000",
        Olive => "#808000",
        Green => "#008000",
        Purple => "#800080",
        Teal => "#008080",
        Navy => "#000080",
        DefaultCompleted => "#339447",
        DefaultInProgress => "#FF6600",
        DefaultNoProgress => "#EEEEEE",
        DefaultInProgressBackground => "#FC7C3D",
    }
}

string_enum! {
    pub enum CardWidgetLinkTarget {
        SameTab => "_self",
        NewTab => "_blank",
    }
}

string_enum! {
    pub enum CardWidgetLinkValue {
        ExternalLink => "External link",
        TaskLink => "Task link",
        NoLink => "No link",
    }
}

string_enum! {
    pub enum CardWidgetImageValue {
        CustomImage => "Custom image",
        NoImage => "No image",
    }
}
