//! Built-in LimeSurvey RemoteControl 2 operations

use super::{
    Kind, Literal, OperationDescriptor, ParamSpec, ParamType, Presence, RemoteArg, ResultShape,
    TextEncoding,
};

const fn required(name: &'static str, ty: ParamType, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        ty,
        presence: Presence::Required,
        description,
    }
}

const fn optional(name: &'static str, ty: ParamType, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        ty,
        presence: Presence::Optional,
        description,
    }
}

const fn defaulted(
    name: &'static str,
    ty: ParamType,
    default: Literal,
    description: &'static str,
) -> ParamSpec {
    ParamSpec {
        name,
        ty,
        presence: Presence::Default(default),
        description,
    }
}

const fn resource(
    name: &'static str,
    remote_method: &'static str,
    description: &'static str,
    params: &'static [ParamSpec],
    remote_args: &'static [RemoteArg],
    result: ResultShape,
) -> OperationDescriptor {
    OperationDescriptor {
        name,
        kind: Kind::Read,
        description,
        params,
        remote_method,
        remote_args,
        result,
        fan_out: None,
        destructive: false,
    }
}

const fn tool(
    name: &'static str,
    kind: Kind,
    remote_method: &'static str,
    description: &'static str,
    params: &'static [ParamSpec],
    remote_args: &'static [RemoteArg],
    result: ResultShape,
) -> OperationDescriptor {
    OperationDescriptor {
        name,
        kind,
        description,
        params,
        remote_method,
        remote_args,
        result,
        fan_out: None,
        destructive: false,
    }
}

impl OperationDescriptor {
    const fn destructive(mut self) -> Self {
        self.destructive = true;
        self
    }

    const fn fan_out(mut self, param: &'static str) -> Self {
        self.fan_out = Some(param);
        self
    }
}

const SID: ParamSpec = required("sid", ParamType::Integer, "Survey ID");
const GID: ParamSpec = required("gid", ParamType::Integer, "Question group ID");
const QID: ParamSpec = required("qid", ParamType::Integer, "Question ID");
const QUOTA_ID: ParamSpec = required("id", ParamType::Integer, "Quota ID");
const TOKEN: ParamSpec = required("token", ParamType::String, "Participant token");
const PROPERTIES: ParamSpec = required(
    "properties",
    ParamType::Mapping,
    "Property names mapped to new values",
);

const ARG_SID: RemoteArg = RemoteArg::Param("sid");
const ARG_GID: RemoteArg = RemoteArg::Param("gid");
const ARG_QID: RemoteArg = RemoteArg::Param("qid");
const ARG_QUOTA_ID: RemoteArg = RemoteArg::Param("id");
const ARG_PROPERTIES: RemoteArg = RemoteArg::Param("properties");
const ARG_NULL: RemoteArg = RemoteArg::Literal(Literal::Null);

const fn site_setting(name: &'static str) -> [RemoteArg; 1] {
    [RemoteArg::Literal(Literal::Str(name))]
}

static OPERATIONS: &[OperationDescriptor] = &[
    // ── Surveys ─────────────────────────────────────────────────────────
    resource(
        "survey://",
        "list_surveys",
        "List all surveys visible to the account",
        &[],
        &[],
        ResultShape::List,
    ),
    resource(
        "survey://{sid}",
        "get_survey_properties",
        "Properties of one survey",
        &[SID],
        &[ARG_SID],
        ResultShape::Mapping,
    ),
    resource(
        "survey-group://",
        "list_survey_groups",
        "List all survey groups",
        &[],
        &[],
        ResultShape::List,
    ),
    // ── Questions and groups ────────────────────────────────────────────
    resource(
        "question://{qid}",
        "get_question_properties",
        "Properties of one question",
        &[QID],
        &[ARG_QID],
        ResultShape::Mapping,
    ),
    resource(
        "questions://{sid}",
        "list_questions",
        "List the questions of a survey",
        &[SID],
        &[ARG_SID],
        ResultShape::List,
    ),
    resource(
        "group://{gid}",
        "get_group_properties",
        "Properties of one question group",
        &[GID],
        &[ARG_GID],
        ResultShape::Mapping,
    ),
    resource(
        "groups://{sid}",
        "list_groups",
        "List the question groups of a survey",
        &[SID],
        &[ARG_SID],
        ResultShape::List,
    ),
    // ── Participants ────────────────────────────────────────────────────
    resource(
        "participant://{token}/survey/{sid}",
        "get_participant_properties",
        "Properties of one survey participant",
        &[TOKEN, SID],
        &[ARG_SID, RemoteArg::TokenQuery("token")],
        ResultShape::Mapping,
    ),
    resource(
        "participants://{sid}",
        "list_participants",
        "List the participants of a survey",
        &[SID],
        &[ARG_SID],
        ResultShape::List,
    ),
    // ── Quotas ──────────────────────────────────────────────────────────
    resource(
        "quota://{id}",
        "get_quota_properties",
        "Properties of one quota",
        &[QUOTA_ID],
        &[ARG_QUOTA_ID],
        ResultShape::Mapping,
    ),
    resource(
        "quotas://{sid}",
        "list_quotas",
        "List the quotas of a survey",
        &[SID],
        &[ARG_SID],
        ResultShape::List,
    ),
    // ── Responses ───────────────────────────────────────────────────────
    resource(
        "responses://{sid}",
        "get_response_ids",
        "IDs of all responses to a survey",
        &[SID],
        &[ARG_SID, ARG_NULL],
        ResultShape::List,
    ),
    // ── Languages ───────────────────────────────────────────────────────
    resource(
        "language://",
        "get_available_site_languages",
        "Languages installed on the site",
        &[],
        &[],
        ResultShape::List,
    ),
    resource(
        "language://default",
        "get_site_settings",
        "Default site language",
        &[],
        &site_setting("defaultlang"),
        ResultShape::Scalar,
    ),
    resource(
        "language://{sid}/{lang}",
        "get_language_properties",
        "Language-specific properties of a survey, by survey ID and language code (formerly language://{lid})",
        &[
            SID,
            required("lang", ParamType::String, "Language code"),
        ],
        &[ARG_SID, ARG_NULL, RemoteArg::Param("lang")],
        ResultShape::Mapping,
    ),
    // ── Server ──────────────────────────────────────────────────────────
    resource(
        "server://version",
        "get_site_settings",
        "LimeSurvey version",
        &[],
        &site_setting("versionnumber"),
        ResultShape::Scalar,
    ),
    resource(
        "server://db_version",
        "get_site_settings",
        "Database schema version",
        &[],
        &site_setting("dbversionnumber"),
        ResultShape::Scalar,
    ),
    resource(
        "server://site_name",
        "get_site_settings",
        "Site name",
        &[],
        &site_setting("sitename"),
        ResultShape::Scalar,
    ),
    resource(
        "server://users",
        "list_users",
        "List administration users",
        &[],
        &[],
        ResultShape::List,
    ),
    // ── Survey structure ────────────────────────────────────────────────
    resource(
        "fieldmap://{sid}",
        "get_fieldmap",
        "Field map of a survey",
        &[SID],
        &[ARG_SID],
        ResultShape::Mapping,
    ),
    resource(
        "summary://{sid}",
        "get_summary",
        "Response and token statistics of a survey",
        &[SID],
        &[ARG_SID],
        ResultShape::Mapping,
    ),
    resource(
        "files://{sid}",
        "get_uploaded_files",
        "Files uploaded with responses to a survey",
        &[SID],
        &[ARG_SID, ARG_NULL],
        ResultShape::Mapping,
    ),
    // ── Response tools ──────────────────────────────────────────────────
    tool(
        "add_response",
        Kind::Mutate,
        "add_response",
        "Add one response to a survey",
        &[
            SID,
            required("response", ParamType::Mapping, "Question codes mapped to answers"),
        ],
        &[ARG_SID, RemoteArg::Param("response")],
        ResultShape::Scalar,
    ),
    tool(
        "add_responses",
        Kind::Mutate,
        "add_response",
        "Add several responses to a survey, one remote call per response",
        &[
            SID,
            required("responses", ParamType::MappingList, "Responses to add"),
        ],
        &[ARG_SID, RemoteArg::Param("responses")],
        ResultShape::Scalar,
    )
    .fan_out("responses"),
    tool(
        "update_response",
        Kind::Mutate,
        "update_response",
        "Update an existing response",
        &[
            SID,
            required("response_id", ParamType::Integer, "Response ID"),
            required("response", ParamType::Mapping, "Question codes mapped to new answers"),
        ],
        &[
            ARG_SID,
            RemoteArg::MergeInto {
                mapping: "response",
                key: "id",
                from: "response_id",
            },
        ],
        ResultShape::Scalar,
    ),
    tool(
        "delete_response",
        Kind::Mutate,
        "delete_response",
        "Delete a response",
        &[
            SID,
            required("response_id", ParamType::Integer, "Response ID"),
        ],
        &[ARG_SID, RemoteArg::Param("response_id")],
        ResultShape::Mapping,
    )
    .destructive(),
    tool(
        "export_responses",
        Kind::Read,
        "export_responses",
        "Export all responses of a survey as a document",
        &[
            SID,
            defaulted(
                "file_format",
                ParamType::Enum(&["csv", "json", "xls", "pdf", "html"]),
                Literal::Str("csv"),
                "Document format",
            ),
            optional("language", ParamType::String, "Language code to export"),
            optional(
                "completion_status",
                ParamType::Enum(&["complete", "incomplete", "all"]),
                "Which responses to include",
            ),
        ],
        &[
            ARG_SID,
            RemoteArg::Param("file_format"),
            RemoteArg::Param("language"),
            RemoteArg::Param("completion_status"),
        ],
        ResultShape::Binary(TextEncoding::Utf8),
    ),
    tool(
        "export_statistics",
        Kind::Read,
        "export_statistics",
        "Export survey statistics as a base64-encoded document",
        &[
            SID,
            defaulted(
                "document_type",
                ParamType::Enum(&["pdf", "xls", "html"]),
                Literal::Str("pdf"),
                "Document format",
            ),
            optional("language", ParamType::String, "Language code"),
        ],
        &[
            ARG_SID,
            RemoteArg::Param("document_type"),
            RemoteArg::Param("language"),
        ],
        ResultShape::Binary(TextEncoding::Base64),
    ),
    tool(
        "export_timeline",
        Kind::Read,
        "export_timeline",
        "Response counts per day or hour over a date range",
        &[
            SID,
            defaulted(
                "period",
                ParamType::Enum(&["day", "hour"]),
                Literal::Str("day"),
                "Bucket size",
            ),
            defaulted("start_date", ParamType::Date, Literal::Null, "Start date (YYYY-MM-DD)"),
            defaulted("end_date", ParamType::Date, Literal::Null, "End date (YYYY-MM-DD)"),
        ],
        &[
            ARG_SID,
            RemoteArg::Param("period"),
            RemoteArg::Param("start_date"),
            RemoteArg::Param("end_date"),
        ],
        ResultShape::Mapping,
    ),
    // ── Survey tools ────────────────────────────────────────────────────
    tool(
        "add_survey",
        Kind::Mutate,
        "add_survey",
        "Create an empty survey",
        &[
            required("title", ParamType::String, "Survey title"),
            required("language", ParamType::String, "Base language code"),
            defaulted(
                "sid",
                ParamType::Integer,
                Literal::Null,
                "Desired survey ID; assigned by the server when omitted",
            ),
            defaulted(
                "format",
                ParamType::Enum(&["A", "G", "S"]),
                Literal::Str("G"),
                "Presentation: all in one, group by group, or question by question",
            ),
        ],
        &[
            ARG_SID,
            RemoteArg::Param("title"),
            RemoteArg::Param("language"),
            RemoteArg::Param("format"),
        ],
        ResultShape::Scalar,
    ),
    tool(
        "copy_survey",
        Kind::Mutate,
        "copy_survey",
        "Copy a survey under a new name",
        &[
            SID,
            required("new_name", ParamType::String, "Title of the copy"),
        ],
        &[ARG_SID, RemoteArg::Param("new_name")],
        ResultShape::Mapping,
    ),
    tool(
        "delete_survey",
        Kind::Mutate,
        "delete_survey",
        "Delete a survey and all its data",
        &[SID],
        &[ARG_SID],
        ResultShape::Mapping,
    )
    .destructive(),
    tool(
        "activate_survey",
        Kind::Mutate,
        "activate_survey",
        "Activate a survey so it accepts responses",
        &[SID],
        &[ARG_SID],
        ResultShape::Mapping,
    ),
    tool(
        "import_survey",
        Kind::Mutate,
        "import_survey",
        "Import a survey from a base64-encoded .lss file",
        &[
            required("survey_file", ParamType::Binary, "Survey file content, base64"),
            defaulted("survey_name", ParamType::String, Literal::Null, "Title of the imported survey"),
        ],
        &[
            RemoteArg::Param("survey_file"),
            RemoteArg::Literal(Literal::Str("lss")),
            RemoteArg::Param("survey_name"),
        ],
        ResultShape::Scalar,
    ),
    tool(
        "set_survey_properties",
        Kind::Mutate,
        "set_survey_properties",
        "Update survey properties",
        &[SID, PROPERTIES],
        &[ARG_SID, ARG_PROPERTIES],
        ResultShape::Mapping,
    ),
    // ── Group tools ─────────────────────────────────────────────────────
    tool(
        "add_group",
        Kind::Mutate,
        "add_group",
        "Add a question group to a survey",
        &[
            SID,
            required("title", ParamType::String, "Group title"),
            defaulted("description", ParamType::String, Literal::Str(""), "Group description"),
        ],
        &[
            ARG_SID,
            RemoteArg::Param("title"),
            RemoteArg::Param("description"),
        ],
        ResultShape::Scalar,
    ),
    tool(
        "delete_group",
        Kind::Mutate,
        "delete_group",
        "Delete a question group",
        &[SID, GID],
        &[ARG_SID, ARG_GID],
        ResultShape::Scalar,
    )
    .destructive(),
    tool(
        "set_group_properties",
        Kind::Mutate,
        "set_group_properties",
        "Update question group properties",
        &[GID, PROPERTIES],
        &[ARG_GID, ARG_PROPERTIES],
        ResultShape::Mapping,
    ),
    tool(
        "import_group",
        Kind::Mutate,
        "import_group",
        "Import a question group from a base64-encoded .lsg file",
        &[
            SID,
            required("group_file", ParamType::Binary, "Group file content, base64"),
            defaulted("group_name", ParamType::String, Literal::Null, "Title of the imported group"),
        ],
        &[
            ARG_SID,
            RemoteArg::Param("group_file"),
            RemoteArg::Literal(Literal::Str("lsg")),
            RemoteArg::Param("group_name"),
        ],
        ResultShape::Scalar,
    ),
    // ── Question tools ──────────────────────────────────────────────────
    tool(
        "delete_question",
        Kind::Mutate,
        "delete_question",
        "Delete a question",
        &[QID],
        &[ARG_QID],
        ResultShape::Scalar,
    )
    .destructive(),
    tool(
        "set_question_properties",
        Kind::Mutate,
        "set_question_properties",
        "Update question properties",
        &[
            QID,
            PROPERTIES,
            optional("language", ParamType::String, "Language code of the texts to update"),
        ],
        &[ARG_QID, ARG_PROPERTIES, RemoteArg::Param("language")],
        ResultShape::Mapping,
    ),
    tool(
        "import_question",
        Kind::Mutate,
        "import_question",
        "Import a question from a base64-encoded .lsq file",
        &[
            SID,
            GID,
            required("question_file", ParamType::Binary, "Question file content, base64"),
        ],
        &[
            ARG_SID,
            ARG_GID,
            RemoteArg::Param("question_file"),
            RemoteArg::Literal(Literal::Str("lsq")),
        ],
        ResultShape::Scalar,
    ),
    // ── Language tools ──────────────────────────────────────────────────
    tool(
        "add_language",
        Kind::Mutate,
        "add_language",
        "Add a language to a survey",
        &[SID, required("language", ParamType::String, "Language code")],
        &[ARG_SID, RemoteArg::Param("language")],
        ResultShape::Mapping,
    ),
    tool(
        "delete_language",
        Kind::Mutate,
        "delete_language",
        "Remove a language from a survey",
        &[SID, required("language", ParamType::String, "Language code")],
        &[ARG_SID, RemoteArg::Param("language")],
        ResultShape::Mapping,
    )
    .destructive(),
    tool(
        "set_language_properties",
        Kind::Mutate,
        "set_language_properties",
        "Update language-specific survey properties",
        &[
            SID,
            PROPERTIES,
            optional("language", ParamType::String, "Language code; base language when omitted"),
        ],
        &[ARG_SID, ARG_PROPERTIES, RemoteArg::Param("language")],
        ResultShape::Mapping,
    ),
    // ── Participant tools ───────────────────────────────────────────────
    tool(
        "add_participants",
        Kind::Mutate,
        "add_participants",
        "Add participants to a survey",
        &[
            SID,
            required("participant_data", ParamType::MappingList, "Participant records"),
            defaulted(
                "create_token",
                ParamType::Bool,
                Literal::Bool(true),
                "Generate access tokens",
            ),
        ],
        &[
            ARG_SID,
            RemoteArg::Param("participant_data"),
            RemoteArg::Param("create_token"),
        ],
        ResultShape::List,
    ),
    tool(
        "delete_participants",
        Kind::Mutate,
        "delete_participants",
        "Delete participants by token ID",
        &[
            SID,
            required("tokens", ParamType::List, "Participant token IDs"),
        ],
        &[ARG_SID, RemoteArg::Param("tokens")],
        ResultShape::Mapping,
    )
    .destructive(),
    tool(
        "invite_participants",
        Kind::Mutate,
        "invite_participants",
        "Send invitations; all pending participants when no token IDs are given",
        &[
            SID,
            defaulted("tokens", ParamType::List, Literal::Null, "Participant token IDs"),
        ],
        &[ARG_SID, RemoteArg::Param("tokens")],
        ResultShape::Mapping,
    ),
    tool(
        "set_participant_properties",
        Kind::Mutate,
        "set_participant_properties",
        "Update one participant's properties",
        &[TOKEN, SID, PROPERTIES],
        &[ARG_SID, RemoteArg::TokenQuery("token"), ARG_PROPERTIES],
        ResultShape::Mapping,
    ),
    tool(
        "import_cpdb_participants",
        Kind::Mutate,
        "cpd_importParticipants",
        "Import participants into the central participant database",
        &[
            required("participants", ParamType::Any, "Participant records"),
            defaulted(
                "update",
                ParamType::Bool,
                Literal::Bool(false),
                "Update participants that already exist",
            ),
        ],
        &[RemoteArg::Param("participants"), RemoteArg::Param("update")],
        ResultShape::Mapping,
    ),
    tool(
        "activate_tokens",
        Kind::Mutate,
        "activate_tokens",
        "Create the participant table of a survey",
        &[
            SID,
            optional("attribute_fields", ParamType::List, "Extra attribute field numbers"),
        ],
        &[ARG_SID, RemoteArg::Param("attribute_fields")],
        ResultShape::Mapping,
    ),
    // ── Quota tools ─────────────────────────────────────────────────────
    tool(
        "add_quota",
        Kind::Mutate,
        "add_quota",
        "Add a quota to a survey",
        &[
            SID,
            required("name", ParamType::String, "Quota name"),
            required("limit", ParamType::Integer, "Maximum number of completed responses"),
            defaulted("active", ParamType::Bool, Literal::Bool(true), "Whether the quota is enforced"),
            defaulted(
                "action",
                ParamType::Enum(&["terminate", "confirm_terminate"]),
                Literal::Str("terminate"),
                "What happens when the quota is reached",
            ),
            defaulted(
                "autoload_url",
                ParamType::Bool,
                Literal::Bool(false),
                "Redirect to the URL when the quota is reached",
            ),
            defaulted("message", ParamType::String, Literal::Str(""), "Message shown to the participant"),
            defaulted("url", ParamType::String, Literal::Str(""), "Redirect URL"),
            defaulted("url_description", ParamType::String, Literal::Str(""), "Redirect URL description"),
        ],
        &[
            ARG_SID,
            RemoteArg::Param("name"),
            RemoteArg::Param("limit"),
            RemoteArg::Param("active"),
            RemoteArg::Param("action"),
            RemoteArg::Param("autoload_url"),
            RemoteArg::Param("message"),
            RemoteArg::Param("url"),
            RemoteArg::Param("url_description"),
        ],
        ResultShape::Scalar,
    ),
    tool(
        "delete_quota",
        Kind::Mutate,
        "delete_quota",
        "Delete a quota",
        &[QUOTA_ID],
        &[ARG_QUOTA_ID],
        ResultShape::Mapping,
    )
    .destructive(),
    tool(
        "set_quota_properties",
        Kind::Mutate,
        "set_quota_properties",
        "Update quota properties",
        &[QUOTA_ID, PROPERTIES],
        &[ARG_QUOTA_ID, ARG_PROPERTIES],
        ResultShape::Mapping,
    ),
    // ── File tools ──────────────────────────────────────────────────────
    tool(
        "upload_file",
        Kind::Mutate,
        "upload_file",
        "Upload a file for a file-upload question",
        &[
            SID,
            required("field_name", ParamType::String, "Field name of the upload question"),
            required("file_name", ParamType::String, "File name"),
            required("file_content", ParamType::Binary, "File content, base64"),
        ],
        &[
            ARG_SID,
            RemoteArg::Param("field_name"),
            RemoteArg::Param("file_name"),
            RemoteArg::Param("file_content"),
        ],
        ResultShape::Mapping,
    ),
    tool(
        "download_files",
        Kind::Read,
        "get_uploaded_files",
        "Files uploaded with responses, optionally for one participant",
        &[
            SID,
            defaulted("token", ParamType::String, Literal::Null, "Participant token"),
        ],
        &[ARG_SID, RemoteArg::Param("token")],
        ResultShape::Mapping,
    ),
];

/// Every built-in operation in table order
pub(super) fn operations() -> Vec<OperationDescriptor> {
    OPERATIONS.to_vec()
}
