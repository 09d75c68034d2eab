use crate::support::ScriptedBackend;
use proptest::prelude::*;
use refactor_guard::backend::BackendKind;
use refactor_guard::lang::{CodeShape, Language, LanguageAdapter, TreeSitterAdapter};
use refactor_guard::{extract_code, Mode, Orchestrator, TransformationRequest};

const INPUT: &str = "def area(w, h):\n    return w * h\n";

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Whatever the backend says, a success parses and a failure returns the input.
    #[test]
    fn result_is_valid_or_untouched(reply in "[ -~\n]{0,120}") {
        let remote = ScriptedBackend::always(BackendKind::Remote, reply);
        let orchestrator = Orchestrator::builder()
            .mode(Mode::Remote)
            .remote(remote)
            .repair_attempts(2)
            .build();
        let adapter = TreeSitterAdapter::new(Language::Python);

        let result = orchestrator.transform(&TransformationRequest::new(INPUT, "python"));

        if result.success {
            prop_assert!(adapter.validate_syntax(&result.final_code).is_ok());
            prop_assert!(result.final_valid);
        } else {
            prop_assert_eq!(&result.final_code, INPUT);
        }
    }

    #[test]
    fn fenced_code_survives_surrounding_chatter(
        names in prop::collection::vec("[a-z]{1,8}", 1..5),
        value in 0u32..10_000,
        before in "[A-Za-z ,!]{0,40}",
        after in "[A-Za-z ,!]{0,40}",
    ) {
        let code = names
            .iter()
            .map(|name| format!("{name}_v = {value}"))
            .collect::<Vec<_>>()
            .join("\n");
        let raw = format!("{before}\n```python\n{code}\n```\n{after}");

        let extracted = extract_code(&raw, CodeShape::for_language(Language::Python), Language::Python);

        prop_assert_eq!(extracted, code);
    }
}
