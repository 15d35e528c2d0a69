//! Post-install message with paths filled in for the selected prefix.

use crate::formula::Formula;
use crate::layout::InstallLayout;

/// Render the formula's caveats, or `None` if it has none.
///
/// Recognised placeholders: `{prefix}`, `{bin}`, `{libexec}`, `{doc}`, `{share}`.
pub fn render(formula: &Formula, layout: &InstallLayout) -> Option<String> {
    let template = formula.caveats.as_deref()?;
    let rendered = [
        ("{prefix}", &layout.prefix),
        ("{bin}", &layout.bin),
        ("{libexec}", &layout.libexec),
        ("{doc}", &layout.doc),
        ("{share}", &layout.share),
    ]
    .iter()
    .fold(template.to_string(), |text, (key, path)| {
        text.replace(*key, &path.to_string_lossy())
    });
    Some(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_prefix;

    #[test]
    fn test_builtin_caveats_name_doc_and_share() {
        let layout = InstallLayout::new(&test_prefix(), "privvy");
        let text = render(&Formula::privvy(), &layout).unwrap();

        assert!(text.contains("Privvy has been installed!"));
        assert!(text.contains(&layout.doc.to_string_lossy().to_string()));
        assert!(text.contains(&format!("{}/privvy/examples/", layout.share.display())));
        assert!(text.contains("privvy create-project my-api"));
        assert!(!text.contains("{doc}"));
    }

    #[test]
    fn test_no_caveats() {
        let mut formula = Formula::privvy();
        formula.caveats = None;
        let layout = InstallLayout::new(&test_prefix(), "privvy");
        assert!(render(&formula, &layout).is_none());
    }

    #[test]
    fn test_unknown_placeholders_are_left_alone() {
        let mut formula = Formula::privvy();
        formula.caveats = Some("run {bin}/privvy {file}".into());
        let layout = InstallLayout::new(&test_prefix(), "privvy");
        assert_eq!(
            render(&formula, &layout).unwrap(),
            format!("run {}/privvy {{file}}", layout.bin.display())
        );
    }
}
