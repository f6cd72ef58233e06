//! # Document Model Module / 文档模型模块
//!
//! This module defines the tree produced by a Gherkin parser:
//! suites, features, rules, backgrounds, scenarios, outlines, examples, steps,
//! tables, doc strings and tags. The tree is immutable once built; execution
//! results are recorded in a separate result tree (see [`crate::core::models`]).
//!
//! 此模块定义由规范语言解析器生成的树：套件、功能、规则、背景、场景、
//! 场景大纲、示例、步骤、表格、文档字符串和标签。树一旦构建即不可变；
//! 执行结果记录在单独的结果树中。
//!
//! Builders resolve the keyword class of conjunction steps (`And`/`But`) as
//! steps are appended, and [`Suite::validate`] checks every structural invariant
//! before a run starts.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};

use crate::core::errors::ParseInvariantViolation;

/// Matches `<name>` placeholders in outline steps.
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([^<>\n]+)>").expect("placeholder regex is valid"));

/// A label attached to a feature, rule, scenario, outline or examples block.
///
/// Equality, ordering and hashing use the name only, so a set of tags
/// de-duplicates by name even if the same tag is declared on different lines.
/// The leading `@` is stripped on construction.
///
/// 附加到节点上的标签。相等性、排序和哈希仅基于名称。
#[derive(Debug, Clone, Serialize)]
pub struct Tag {
    pub name: String,
    pub line: u32,
}

impl Tag {
    pub fn new(name: &str) -> Self {
        Self::at(name, 0)
    }

    pub fn at(name: &str, line: u32) -> Self {
        Self {
            name: normalize_tag(name).to_string(),
            line,
        }
    }
}

/// Strips the optional `@` sigil from a tag name.
pub fn normalize_tag(name: &str) -> &str {
    name.trim().trim_start_matches('@')
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl Borrow<str> for Tag {
    fn borrow(&self) -> &str {
        &self.name
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

/// Own tags of a node.
pub type TagSet = BTreeSet<Tag>;

/// Computes effective tags: the union of a node's own tags with every
/// ancestor's tags. Never mutates the inputs.
pub fn effective_tags<'a, I>(lineage: I) -> TagSet
where
    I: IntoIterator<Item = &'a TagSet>,
{
    lineage.into_iter().flatten().cloned().collect()
}

/// Keyword class of a step as written in the document.
/// 文档中书写的步骤关键字类别。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordClass {
    /// `Given`
    Context,
    /// `When`
    Action,
    /// `Then`
    Outcome,
    /// `And` / `But` / `*`
    Conjunction,
}

impl KeywordClass {
    pub fn default_keyword(self) -> &'static str {
        match self {
            KeywordClass::Context => "Given",
            KeywordClass::Action => "When",
            KeywordClass::Outcome => "Then",
            KeywordClass::Conjunction => "And",
        }
    }
}

/// A header row plus ordered data rows. Every row has the header's width.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub headings: Vec<String>,
    pub rows: Vec<TableRow>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub cells: Vec<String>,
    pub line: u32,
}

impl Table {
    pub fn new<I, S>(headings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headings: headings.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            line: 0,
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    /// Appends a data row. Its line defaults to the line after the previous row.
    pub fn row<I, S>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let line = self.rows.last().map_or(self.line + 1, |row| row.line + 1);
        self.rows.push(TableRow {
            cells: cells.into_iter().map(Into::into).collect(),
            line,
        });
        self
    }

    pub fn column_index(&self, heading: &str) -> Option<usize> {
        self.headings.iter().position(|h| h == heading)
    }

    /// Looks up the cell under `heading` in `row`.
    pub fn cell<'a>(&'a self, row: &'a TableRow, heading: &str) -> Option<&'a str> {
        let index = self.column_index(heading)?;
        row.cells.get(index).map(String::as_str)
    }

    /// Iterates rows as heading → cell maps.
    pub fn records(&self) -> impl Iterator<Item = HashMap<&str, &str>> + '_ {
        self.rows.iter().map(|row| {
            self.headings
                .iter()
                .map(String::as_str)
                .zip(row.cells.iter().map(String::as_str))
                .collect()
        })
    }

    fn substitute(&self, values: &HashMap<&str, &str>) -> Table {
        Table {
            headings: self
                .headings
                .iter()
                .map(|cell| substitute_placeholders(cell, values))
                .collect(),
            rows: self
                .rows
                .iter()
                .map(|row| TableRow {
                    cells: row
                        .cells
                        .iter()
                        .map(|cell| substitute_placeholders(cell, values))
                        .collect(),
                    line: row.line,
                })
                .collect(),
            line: self.line,
        }
    }
}

/// A multi-line text argument with an optional content type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocString {
    pub content: String,
    pub content_type: Option<String>,
    pub line: u32,
}

impl DocString {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            content_type: None,
            line: 0,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepArgument {
    Table(Table),
    DocString(DocString),
}

/// One line of a scenario.
/// 场景中的一行。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    /// Keyword text as written, e.g. `Given` or `And`.
    pub keyword: String,
    pub keyword_class: KeywordClass,
    /// The effective class used for matching. Conjunctions inherit the class of
    /// the preceding step; `None` when nothing precedes a conjunction.
    pub step_type: Option<KeywordClass>,
    pub text: String,
    pub argument: Option<StepArgument>,
    pub line: u32,
}

impl Step {
    pub fn new(keyword_class: KeywordClass, text: impl Into<String>) -> Self {
        Self {
            keyword: keyword_class.default_keyword().to_string(),
            keyword_class,
            step_type: match keyword_class {
                KeywordClass::Conjunction => None,
                class => Some(class),
            },
            text: text.into(),
            argument: None,
            line: 0,
        }
    }

    pub fn given(text: impl Into<String>) -> Self {
        Self::new(KeywordClass::Context, text)
    }

    pub fn when(text: impl Into<String>) -> Self {
        Self::new(KeywordClass::Action, text)
    }

    pub fn then(text: impl Into<String>) -> Self {
        Self::new(KeywordClass::Outcome, text)
    }

    pub fn and(text: impl Into<String>) -> Self {
        Self::new(KeywordClass::Conjunction, text)
    }

    pub fn but(text: impl Into<String>) -> Self {
        Self::new(KeywordClass::Conjunction, text).with_keyword("But")
    }

    /// Overrides the keyword text, e.g. for a localized document.
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.argument = Some(StepArgument::Table(table));
        self
    }

    pub fn with_doc_string(mut self, doc_string: DocString) -> Self {
        self.argument = Some(StepArgument::DocString(doc_string));
        self
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    pub fn table(&self) -> Option<&Table> {
        match &self.argument {
            Some(StepArgument::Table(table)) => Some(table),
            _ => None,
        }
    }

    pub fn doc_string(&self) -> Option<&DocString> {
        match &self.argument {
            Some(StepArgument::DocString(doc)) => Some(doc),
            _ => None,
        }
    }

    /// Placeholders named in the step text. Tables and doc strings may carry
    /// markup such as `<div>`, so only their known columns are substituted.
    fn placeholders(&self) -> Vec<String> {
        placeholder_names(&self.text)
    }

    fn substitute(&self, values: &HashMap<&str, &str>) -> Step {
        Step {
            text: substitute_placeholders(&self.text, values),
            argument: self.argument.as_ref().map(|argument| match argument {
                StepArgument::Table(table) => StepArgument::Table(table.substitute(values)),
                StepArgument::DocString(doc) => StepArgument::DocString(DocString {
                    content: substitute_placeholders(&doc.content, values),
                    content_type: doc.content_type.clone(),
                    line: doc.line,
                }),
            }),
            ..self.clone()
        }
    }
}

/// Appends `step`, resolving a conjunction against the preceding step.
fn push_step(steps: &mut Vec<Step>, mut step: Step) {
    if step.keyword_class == KeywordClass::Conjunction {
        step.step_type = steps.last().and_then(|previous| previous.step_type);
    }
    steps.push(step);
}

macro_rules! step_builders {
    () => {
        /// Appends a step, resolving conjunctions against the previous step.
        pub fn step(mut self, step: Step) -> Self {
            push_step(&mut self.steps, step);
            self
        }

        pub fn given(self, text: impl Into<String>) -> Self {
            self.step(Step::given(text))
        }

        pub fn when(self, text: impl Into<String>) -> Self {
            self.step(Step::when(text))
        }

        pub fn then(self, text: impl Into<String>) -> Self {
            self.step(Step::then(text))
        }

        pub fn and(self, text: impl Into<String>) -> Self {
            self.step(Step::and(text))
        }

        pub fn but(self, text: impl Into<String>) -> Self {
            self.step(Step::but(text))
        }
    };
}

macro_rules! tag_builders {
    () => {
        pub fn tag(mut self, name: &str) -> Self {
            self.tags.insert(Tag::new(name));
            self
        }

        pub fn tags<'t>(mut self, names: impl IntoIterator<Item = &'t str>) -> Self {
            self.tags.extend(names.into_iter().map(Tag::new));
            self
        }
    };
}

/// Steps prefixed onto every scenario of the enclosing feature or rule.
/// Never executed standalone and never tagged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Background {
    pub keyword: String,
    pub name: String,
    pub line: u32,
    pub steps: Vec<Step>,
}

impl Background {
    pub fn new() -> Self {
        Self {
            keyword: "Background".to_string(),
            name: String::new(),
            line: 0,
            steps: Vec::new(),
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    step_builders!();
}

impl Default for Background {
    fn default() -> Self {
        Self::new()
    }
}

/// Where an expanded scenario came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExampleOrigin {
    pub outline_line: u32,
    pub examples_index: usize,
    pub row_index: usize,
}

/// One concrete test case.
/// 一个具体的测试用例。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario {
    pub keyword: String,
    pub name: String,
    pub tags: TagSet,
    pub line: u32,
    pub steps: Vec<Step>,
    /// Set on scenarios materialized from an outline row.
    pub origin: Option<ExampleOrigin>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            keyword: "Scenario".to_string(),
            name: name.into(),
            tags: TagSet::new(),
            line: 0,
            steps: Vec::new(),
            origin: None,
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    step_builders!();
    tag_builders!();
}

/// A block of example rows bound to an outline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Examples {
    pub keyword: String,
    pub name: String,
    pub tags: TagSet,
    pub line: u32,
    pub table: Table,
}

impl Examples {
    pub fn new(table: Table) -> Self {
        Self {
            keyword: "Examples".to_string(),
            name: String::new(),
            tags: TagSet::new(),
            line: table.line.saturating_sub(1),
            table,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    tag_builders!();
}

/// A scenario template expanded once per examples row.
/// 场景模板，按每个示例行展开一次。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioOutline {
    pub keyword: String,
    pub name: String,
    pub tags: TagSet,
    pub line: u32,
    pub steps: Vec<Step>,
    pub examples: Vec<Examples>,
}

impl ScenarioOutline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            keyword: "Scenario Outline".to_string(),
            name: name.into(),
            tags: TagSet::new(),
            line: 0,
            steps: Vec::new(),
            examples: Vec::new(),
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    pub fn examples(mut self, examples: Examples) -> Self {
        self.examples.push(examples);
        self
    }

    step_builders!();
    tag_builders!();

    /// Materializes one scenario per (examples block × data row), in block
    /// order then row order. Placeholders are substituted verbatim in step
    /// text, tables, doc strings and the scenario name.
    pub fn expand(&self) -> Vec<Scenario> {
        let mut scenarios = Vec::new();
        for (examples_index, examples) in self.examples.iter().enumerate() {
            for (row_index, row) in examples.table.rows.iter().enumerate() {
                let values: HashMap<&str, &str> = examples
                    .table
                    .headings
                    .iter()
                    .map(String::as_str)
                    .zip(row.cells.iter().map(String::as_str))
                    .collect();
                let mut name = format!(
                    "{} -- @{}.{}",
                    substitute_placeholders(&self.name, &values),
                    examples_index + 1,
                    row_index + 1
                );
                if !examples.name.is_empty() {
                    name.push(' ');
                    name.push_str(&examples.name);
                }
                scenarios.push(Scenario {
                    keyword: self.keyword.clone(),
                    name,
                    tags: effective_tags([&self.tags, &examples.tags]),
                    line: row.line,
                    steps: self.steps.iter().map(|step| step.substitute(&values)).collect(),
                    origin: Some(ExampleOrigin {
                        outline_line: self.line,
                        examples_index,
                        row_index,
                    }),
                });
            }
        }
        scenarios
    }
}

/// A scenario-level child of a feature or rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScenarioDefinition {
    Scenario(Scenario),
    Outline(ScenarioOutline),
}

impl ScenarioDefinition {
    /// Concrete scenarios in execution order.
    pub fn scenarios(&self) -> Vec<std::borrow::Cow<'_, Scenario>> {
        match self {
            ScenarioDefinition::Scenario(scenario) => vec![std::borrow::Cow::Borrowed(scenario)],
            ScenarioDefinition::Outline(outline) => outline
                .expand()
                .into_iter()
                .map(std::borrow::Cow::Owned)
                .collect(),
        }
    }

    fn validate(&self, path: &str) -> Result<(), ParseInvariantViolation> {
        match self {
            ScenarioDefinition::Scenario(scenario) => validate_steps(path, &scenario.steps),
            ScenarioDefinition::Outline(outline) => validate_outline(path, outline),
        }
    }
}

/// Optional grouping layer between a feature and its scenarios.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub keyword: String,
    pub name: String,
    pub tags: TagSet,
    pub line: u32,
    pub background: Option<Background>,
    pub children: Vec<ScenarioDefinition>,
}

impl Rule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            keyword: "Rule".to_string(),
            name: name.into(),
            tags: TagSet::new(),
            line: 0,
            background: None,
            children: Vec::new(),
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    pub fn background(mut self, background: Background) -> Self {
        self.background = Some(background);
        self
    }

    pub fn scenario(mut self, scenario: Scenario) -> Self {
        self.children.push(ScenarioDefinition::Scenario(scenario));
        self
    }

    pub fn outline(mut self, outline: ScenarioOutline) -> Self {
        self.children.push(ScenarioDefinition::Outline(outline));
        self
    }

    tag_builders!();
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeatureChild {
    Scenario(Scenario),
    Outline(ScenarioOutline),
    Rule(Rule),
}

/// Root-level Gherkin document.
/// 根级别的规范单元。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feature {
    pub keyword: String,
    pub name: String,
    /// Path of the source document, used in scenario identities.
    pub path: String,
    /// Keyword locale of the source document.
    pub language: String,
    pub tags: TagSet,
    pub line: u32,
    pub background: Option<Background>,
    pub children: Vec<FeatureChild>,
}

impl Feature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            keyword: "Feature".to_string(),
            name: name.into(),
            path: String::new(),
            language: "en".to_string(),
            tags: TagSet::new(),
            line: 1,
            background: None,
            children: Vec::new(),
        }
    }

    pub fn at_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn background(mut self, background: Background) -> Self {
        self.background = Some(background);
        self
    }

    pub fn scenario(mut self, scenario: Scenario) -> Self {
        self.children.push(FeatureChild::Scenario(scenario));
        self
    }

    pub fn outline(mut self, outline: ScenarioOutline) -> Self {
        self.children.push(FeatureChild::Outline(outline));
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.children.push(FeatureChild::Rule(rule));
        self
    }

    tag_builders!();

    /// Checks conjunction resolution, table shape and outline bindings.
    pub fn validate(&self) -> Result<(), ParseInvariantViolation> {
        if let Some(background) = &self.background {
            validate_steps(&self.path, &background.steps)?;
        }
        for child in &self.children {
            match child {
                FeatureChild::Scenario(scenario) => validate_steps(&self.path, &scenario.steps)?,
                FeatureChild::Outline(outline) => validate_outline(&self.path, outline)?,
                FeatureChild::Rule(rule) => {
                    if let Some(background) = &rule.background {
                        validate_steps(&self.path, &background.steps)?;
                    }
                    for definition in &rule.children {
                        definition.validate(&self.path)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// The set of features making up one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Suite {
    pub features: Vec<Feature>,
}

impl Suite {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn validate(&self) -> Result<(), ParseInvariantViolation> {
        self.features.iter().try_for_each(Feature::validate)
    }
}

fn validate_steps(path: &str, steps: &[Step]) -> Result<(), ParseInvariantViolation> {
    for step in steps {
        if step.step_type.is_none() {
            return Err(ParseInvariantViolation::new(
                path,
                step.line,
                format!(
                    "conjunction step `{} {}` has no preceding step to inherit a keyword class from",
                    step.keyword, step.text
                ),
            ));
        }
        if let Some(table) = step.table() {
            validate_table(path, table)?;
        }
    }
    Ok(())
}

fn validate_table(path: &str, table: &Table) -> Result<(), ParseInvariantViolation> {
    let width = table.headings.len();
    match table.rows.iter().find(|row| row.cells.len() != width) {
        Some(row) => Err(ParseInvariantViolation::new(
            path,
            row.line,
            format!(
                "table row has {} cells but the header has {}",
                row.cells.len(),
                width
            ),
        )),
        None => Ok(()),
    }
}

fn validate_outline(path: &str, outline: &ScenarioOutline) -> Result<(), ParseInvariantViolation> {
    validate_steps(path, &outline.steps)?;
    if outline.examples.is_empty() {
        return Err(ParseInvariantViolation::new(
            path,
            outline.line,
            format!("scenario outline `{}` has no examples", outline.name),
        ));
    }
    let placeholders: BTreeSet<String> = outline.steps.iter().flat_map(Step::placeholders).collect();
    for examples in &outline.examples {
        validate_table(path, &examples.table)?;
        if examples.table.rows.is_empty() {
            return Err(ParseInvariantViolation::new(
                path,
                examples.line,
                format!("examples of outline `{}` have no data rows", outline.name),
            ));
        }
        if let Some(missing) = placeholders
            .iter()
            .find(|name| examples.table.column_index(name).is_none())
        {
            return Err(ParseInvariantViolation::new(
                path,
                examples.line,
                format!(
                    "placeholder <{missing}> of outline `{}` is not an examples column",
                    outline.name
                ),
            ));
        }
    }
    Ok(())
}

fn placeholder_names(text: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

fn substitute_placeholders(text: &str, values: &HashMap<&str, &str>) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &regex::Captures<'_>| match values.get(&caps[1]) {
            Some(value) => (*value).to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}
