//! Declaration parsers.
//!
//! One method per grammar production, dispatched on the leading keyword.
//! The colon operator and the reference arrow are sugar: `field a : b`
//! synthesizes an `ancestors` property, `field a -> b` a `references`
//! property, exactly as if they had been written out in the body.

use crate::ast::{Arena, Arg, DefId, Definition, Import, ImportTarget, Modifiers, Value};
use crate::foundation::{DefKind, DottedName, KindSet, SortDir, Span};
use crate::lexer::Token;
use crate::parser::stream::TokenStream;
use crate::parser::{ParseError, ParsedSchema};

pub(super) struct SchemaParser<'a, 'src> {
    stream: &'a mut TokenStream<'src>,
    arena: &'a mut Arena,
}

impl<'a, 'src> SchemaParser<'a, 'src> {
    pub(super) fn new(stream: &'a mut TokenStream<'src>, arena: &'a mut Arena) -> Self {
        Self { stream, arena }
    }

    /// `schema <package> { uses defs }`
    pub(super) fn parse_schema(&mut self) -> Result<ParsedSchema, ParseError> {
        self.stream.expect(Token::Schema)?;
        let (package, package_span) = self.parse_package_name()?;
        self.stream.expect(Token::LBrace)?;

        let simple_name = package
            .rsplit('.')
            .next()
            .expect("package names are non-empty")
            .to_string();
        let mut root_def = Definition::new(DefKind::Schema, simple_name, package_span);
        root_def.package = Some(package.clone());
        let root = self.arena.alloc(root_def);

        let mut imports = Vec::new();
        while matches!(self.stream.peek(), Some(Token::Use) | Some(Token::Require)) {
            imports.push(self.parse_import()?);
        }

        while !self.stream.check(&Token::RBrace) {
            match self.stream.peek() {
                Some(Token::Use) | Some(Token::Require) => {
                    return Err(ParseError::new(
                        "import statements must precede definitions",
                        self.stream.current_span(),
                    ));
                }
                Some(_) => {
                    let item = self.parse_schema_item()?;
                    self.arena.attach(root, item);
                }
                None => {
                    return Err(ParseError::expected(
                        "'}'",
                        None,
                        self.stream.current_span(),
                    ));
                }
            }
        }
        self.stream.expect(Token::RBrace)?;

        Ok(ParsedSchema {
            root,
            package,
            package_span,
            imports,
        })
    }

    /// `use <target> [as alias];` | `require <target> [as alias];`
    fn parse_import(&mut self) -> Result<Import, ParseError> {
        let start = self.stream.pos();
        let required = match self.stream.advance() {
            Some(Token::Require) => true,
            Some(Token::Use) => false,
            _ => unreachable!("caller checked for an import keyword"),
        };
        let target = match self.stream.peek() {
            Some(Token::Str(uri)) => {
                let uri = uri.clone();
                self.stream.advance();
                ImportTarget::Uri(uri)
            }
            _ => {
                let (name, _) = self.parse_package_name()?;
                ImportTarget::Package(name)
            }
        };
        let alias = if self.stream.eat(&Token::As) {
            Some(self.stream.expect_word()?.0)
        } else {
            None
        };
        self.stream.expect(Token::Semicolon)?;
        Ok(Import {
            target,
            alias,
            required,
            implicit: false,
            span: self.stream.span_from(start),
            origin: None,
            resolved: None,
        })
    }

    /// Schema-level item: field, fieldset or property.
    fn parse_schema_item(&mut self) -> Result<DefId, ParseError> {
        let start = self.stream.pos();
        let modifiers = self.parse_modifiers();
        match self.stream.peek() {
            Some(Token::Field) => self.parse_field(modifiers, start),
            Some(Token::Fieldset) => self.parse_fieldset(modifiers, start),
            Some(Token::Word(_)) | Some(Token::Fields) if start == self.stream.pos() => {
                self.parse_property()
            }
            other => Err(ParseError::expected(
                "'field', 'fieldset' or a property",
                other.cloned(),
                self.stream.current_span(),
            )),
        }
    }

    /// Leading `abstract`/`final`/`required` modifiers.
    fn parse_modifiers(&mut self) -> Modifiers {
        let mut modifiers = Modifiers::empty();
        loop {
            match self.stream.peek() {
                Some(Token::Abstract) => modifiers.set_abstract(),
                Some(Token::Final) => modifiers.set_final(),
                Some(Token::Required) => modifiers.set_required(),
                _ => return modifiers,
            }
            self.stream.advance();
        }
    }

    /// `field <name> [: ancestors] [-> target] (; | { props })`
    fn parse_field(&mut self, modifiers: Modifiers, start: usize) -> Result<DefId, ParseError> {
        self.stream.expect(Token::Field)?;
        let (name, _) = self.stream.expect_word()?;
        let ancestors = self.parse_typedef()?;
        let reference = if self.stream.eat(&Token::Arrow) {
            Some(self.parse_ref_target()?)
        } else {
            None
        };
        let head_span = self.stream.span_from(start);

        let mut field = Definition::new(DefKind::Field, name, head_span);
        field.modifiers = modifiers;
        let field = self.arena.alloc(field);

        if self.stream.eat(&Token::Semicolon) {
            // no body
        } else {
            self.stream.expect(Token::LBrace)?;
            while !self.stream.check(&Token::RBrace) {
                let prop = self.parse_property()?;
                self.arena.attach(field, prop);
            }
            self.stream.expect(Token::RBrace)?;
        }

        self.attach_sugar(field, ancestors, reference, head_span);
        Ok(field)
    }

    /// `fieldset <name> [: ancestors] (; | { items })`
    fn parse_fieldset(&mut self, modifiers: Modifiers, start: usize) -> Result<DefId, ParseError> {
        self.stream.expect(Token::Fieldset)?;
        let (name, _) = self.stream.expect_word()?;
        let ancestors = self.parse_typedef()?;
        let head_span = self.stream.span_from(start);

        let mut fieldset = Definition::new(DefKind::Fieldset, name, head_span);
        fieldset.modifiers = modifiers;
        let fieldset = self.arena.alloc(fieldset);

        if self.stream.eat(&Token::Semicolon) {
            // stub: no body
        } else {
            self.stream.expect(Token::LBrace)?;
            while !self.stream.check(&Token::RBrace) {
                let item = self.parse_fieldset_item()?;
                self.arena.attach(fieldset, item);
            }
            self.stream.expect(Token::RBrace)?;
        }

        self.attach_sugar(fieldset, ancestors, None, head_span);
        Ok(fieldset)
    }

    /// Item inside a fieldset body.
    fn parse_fieldset_item(&mut self) -> Result<DefId, ParseError> {
        let start = self.stream.pos();
        let modifiers = self.parse_modifiers();
        match self.stream.peek() {
            Some(Token::Field) => self.parse_field(modifiers, start),
            Some(Token::Fieldset) => self.parse_fieldset(modifiers, start),
            Some(Token::Index) if start == self.stream.pos() => self.parse_index(),
            Some(Token::Constraint) if start == self.stream.pos() => self.parse_constraint(),
            Some(Token::Delete) if start == self.stream.pos() => self.parse_deletion(),
            Some(Token::Word(_)) | Some(Token::Fields) if start == self.stream.pos() => {
                self.parse_property()
            }
            other => Err(ParseError::expected(
                "a definition, property or deletion",
                other.cloned(),
                self.stream.current_span(),
            )),
        }
    }

    /// `index <name> { props }`
    fn parse_index(&mut self) -> Result<DefId, ParseError> {
        let start = self.stream.pos();
        self.stream.expect(Token::Index)?;
        let (name, _) = self.stream.expect_word()?;
        let index = self
            .arena
            .alloc(Definition::new(DefKind::Index, name, self.stream.span_from(start)));
        self.stream.expect(Token::LBrace)?;
        while !self.stream.check(&Token::RBrace) {
            let prop = self.parse_property()?;
            self.arena.attach(index, prop);
        }
        self.stream.expect(Token::RBrace)?;
        Ok(index)
    }

    /// `constraint <name> { props }`
    fn parse_constraint(&mut self) -> Result<DefId, ParseError> {
        let start = self.stream.pos();
        self.stream.expect(Token::Constraint)?;
        let (name, _) = self.stream.expect_word()?;
        let constraint = self.arena.alloc(Definition::new(
            DefKind::Constraint,
            name,
            self.stream.span_from(start),
        ));
        self.stream.expect(Token::LBrace)?;
        while !self.stream.check(&Token::RBrace) {
            let prop = self.parse_property()?;
            self.arena.attach(constraint, prop);
        }
        self.stream.expect(Token::RBrace)?;
        Ok(constraint)
    }

    /// `delete <name>;`
    fn parse_deletion(&mut self) -> Result<DefId, ParseError> {
        let start = self.stream.pos();
        self.stream.expect(Token::Delete)?;
        let (target, _) = self.stream.expect_word()?;
        self.stream.expect(Token::Semicolon)?;
        let mut deletion = Definition::new(DefKind::Deletion, "", self.stream.span_from(start));
        deletion.delete_target = Some(target);
        Ok(self.arena.alloc(deletion))
    }

    /// `name values... ;` — also covers the `fields` property, whose
    /// arguments may carry `+`/`-` sort directions.
    fn parse_property(&mut self) -> Result<DefId, ParseError> {
        let start = self.stream.pos();
        let (name, sortable) = match self.stream.peek() {
            Some(Token::Fields) => {
                self.stream.advance();
                ("fields".to_string(), true)
            }
            _ => (self.stream.expect_word()?.0, false),
        };

        let mut args = Vec::new();
        while !self.stream.check(&Token::Semicolon) {
            match self.parse_prop_value(sortable)? {
                Some(arg) => args.push(arg),
                None => break,
            }
        }
        self.stream.expect(Token::Semicolon)?;

        let mut prop = Definition::new(DefKind::Property, name, self.stream.span_from(start));
        prop.args = args;
        Ok(self.arena.alloc(prop))
    }

    /// One property argument, or `None` when the next token cannot start
    /// a value (the caller then reports the semicolon as missing).
    fn parse_prop_value(&mut self, sortable: bool) -> Result<Option<Arg>, ParseError> {
        let span = self.stream.current_span();
        let value = match self.stream.peek() {
            Some(Token::Str(s)) => {
                let s = s.clone();
                self.stream.advance();
                Value::Str(s)
            }
            Some(Token::Int(v)) => {
                let v = *v;
                self.stream.advance();
                Value::Int(v)
            }
            Some(Token::Float(v)) => {
                let v = *v;
                self.stream.advance();
                Value::Float(v)
            }
            Some(Token::True) => {
                self.stream.advance();
                Value::Bool(true)
            }
            Some(Token::False) => {
                self.stream.advance();
                Value::Bool(false)
            }
            Some(Token::None) => {
                self.stream.advance();
                Value::None
            }
            Some(Token::All) => {
                self.stream.advance();
                Value::All
            }
            Some(Token::Any) => {
                self.stream.advance();
                Value::Any
            }
            Some(Token::Plus) | Some(Token::Minus) if sortable => {
                let desc = self.stream.check(&Token::Minus);
                self.stream.advance();
                let name = self.parse_dotted_name()?;
                let span = span.merge(&name.span);
                let mut arg = Arg::new(Value::Name(name), span);
                arg.direction = if desc { SortDir::Desc } else { SortDir::Asc };
                return Ok(Some(arg));
            }
            Some(Token::Equals) | Some(Token::Word(_)) | Some(Token::Schema) => {
                Value::Name(self.parse_imp_name()?)
            }
            _ => return Ok(None),
        };
        Ok(Some(Arg::new(value, span)))
    }

    /// `[=] dotted_name`
    fn parse_imp_name(&mut self) -> Result<DottedName, ParseError> {
        let imp = self.stream.eat(&Token::Equals);
        let mut name = self.parse_dotted_name()?;
        name.imp = imp;
        Ok(name)
    }

    /// `[schema.] name (. name)* [min_classes]`
    fn parse_dotted_name(&mut self) -> Result<DottedName, ParseError> {
        let start = self.stream.pos();
        let absolute = if self.stream.check(&Token::Schema) {
            self.stream.advance();
            self.stream.expect(Token::Dot)?;
            true
        } else {
            false
        };
        let mut segments = vec![self.stream.expect_word()?.0];
        while self.stream.check(&Token::Dot) {
            self.stream.advance();
            segments.push(self.stream.expect_word()?.0);
        }
        let min_classes = self.parse_min_classes()?;
        let mut name = DottedName::new(segments, self.stream.span_from(start));
        name.absolute = absolute;
        name.min_classes = min_classes;
        Ok(name)
    }

    /// `[ (schema|fieldset|field|index|property)+ ]`
    fn parse_min_classes(&mut self) -> Result<Option<KindSet>, ParseError> {
        if !self.stream.eat(&Token::LBracket) {
            return Ok(None);
        }
        let mut set = KindSet::empty();
        loop {
            match self.stream.peek() {
                Some(Token::Schema) => set = set.with(DefKind::Schema),
                Some(Token::Fieldset) => set = set.with(DefKind::Fieldset),
                Some(Token::Field) => set = set.with(DefKind::Field),
                Some(Token::Index) => set = set.with(DefKind::Index),
                Some(Token::Word(w)) if w == "property" => set = set.with(DefKind::Property),
                Some(Token::RBracket) if !set.is_empty() => {
                    self.stream.advance();
                    return Ok(Some(set));
                }
                other => {
                    return Err(ParseError::expected(
                        "a definition kind",
                        other.cloned(),
                        self.stream.current_span(),
                    ));
                }
            }
            self.stream.advance();
        }
    }

    /// `: imp_name+` — the ancestor list of the colon operator.
    fn parse_typedef(&mut self) -> Result<Vec<Arg>, ParseError> {
        if !self.stream.eat(&Token::Colon) {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        loop {
            let name = self.parse_imp_name()?;
            names.push(Arg::new(Value::Name(name.clone()), name.span));
            match self.stream.peek() {
                Some(Token::Equals) | Some(Token::Word(_)) | Some(Token::Schema) => continue,
                _ => return Ok(names),
            }
        }
    }

    /// `-> imp_name` or `-> any` — the reference arrow target.
    fn parse_ref_target(&mut self) -> Result<Arg, ParseError> {
        if self.stream.check(&Token::Any) {
            let span = self.stream.current_span();
            self.stream.advance();
            return Ok(Arg::new(Value::Any, span));
        }
        let name = self.parse_imp_name()?;
        let span = name.span;
        Ok(Arg::new(Value::Name(name), span))
    }

    /// Attach the synthesized `ancestors`/`references` properties of the
    /// colon and arrow sugar.
    fn attach_sugar(
        &mut self,
        def: DefId,
        ancestors: Vec<Arg>,
        reference: Option<Arg>,
        span: Span,
    ) {
        if !ancestors.is_empty() {
            let mut prop = Definition::new(DefKind::Property, "ancestors", span);
            prop.args = ancestors;
            let prop = self.arena.alloc(prop);
            self.arena.attach(def, prop);
        }
        if let Some(target) = reference {
            let mut prop = Definition::new(DefKind::Property, "references", span);
            prop.args = vec![target];
            let prop = self.arena.alloc(prop);
            self.arena.attach(def, prop);
        }
    }

    /// `name (. name)*` without prefixes or min-classes: package names.
    fn parse_package_name(&mut self) -> Result<(String, Span), ParseError> {
        let start = self.stream.pos();
        let mut name = self.stream.expect_word()?.0;
        while self.stream.check(&Token::Dot) {
            self.stream.advance();
            name.push('.');
            name.push_str(&self.stream.expect_word()?.0);
        }
        Ok((name, self.stream.span_from(start)))
    }
}
