use jsonpath_types::{JSONPathErrorType, Query, TextRange};

mod errors {
    use super::*;

    #[test]
    #[should_panic(expected = "unknown function 'nosuchthing'")]
    fn unknown_function() {
        Query::standard("$[?nosuchthing()]").unwrap();
    }

    #[test]
    #[should_panic(expected = "count() takes 1 argument but 0 were given")]
    fn not_enough_arguments() {
        Query::standard("$[?count()]").unwrap();
    }

    #[test]
    #[should_panic(expected = "count() takes 1 argument but 2 were given")]
    fn too_many_arguments() {
        Query::standard("$[?count(@.foo, $.bar)]").unwrap();
    }

    #[test]
    #[should_panic(expected = "unbalanced parentheses")]
    fn unbalanced_parens() {
        Query::standard("$[?((@.foo)]").unwrap();
    }

    #[test]
    #[should_panic(expected = "expected a filter expression")]
    fn empty_parens() {
        Query::standard("$[?()]").unwrap();
    }

    #[test]
    #[should_panic(expected = "unclosed bracketed selection")]
    fn unclosed_bracketed_selection() {
        Query::standard("$[1, 3").unwrap();
    }

    #[test]
    #[should_panic(expected = "unclosed bracketed selection")]
    fn unclosed_bracketed_selection_inside_filter() {
        Query::standard("$[?@.a < 1").unwrap();
    }

    #[test]
    fn error_kinds_and_spans() {
        let err = Query::standard("$[?nosuchthing()]").unwrap_err();
        assert_eq!(err.kind, JSONPathErrorType::NameError);
        assert_eq!(err.span, TextRange::new(3, 14));

        let err = Query::standard("$[?count(1) == 1]").unwrap_err();
        assert_eq!(err.kind, JSONPathErrorType::TypeError);

        let err = Query::standard("$.").unwrap_err();
        assert_eq!(err.kind, JSONPathErrorType::SyntaxError);
    }
}

mod recovery {
    use super::*;

    fn messages(expr: &str) -> Vec<String> {
        Query::parse(expr)
            .diagnostics
            .into_iter()
            .map(|d| d.message)
            .collect()
    }

    #[test]
    fn every_problem_is_reported() {
        assert_eq!(
            messages("$[01, 'a].b"),
            vec![
                "leading zeros are not allowed in indices",
                "unclosed string literal",
                "unclosed bracketed selection",
            ]
        );
    }

    #[test]
    fn missing_root() {
        let query = Query::parse(".a");
        assert_eq!(query.diagnostics[0].message, "expected '$', found '.'");
        assert_eq!(query.to_string(), "$['a']");
    }

    #[test]
    fn garbage_after_query() {
        let query = Query::parse("$.a)b");
        assert!(query.has_errors());
        assert_eq!(query.to_source(), "$.a)b");
    }
}
