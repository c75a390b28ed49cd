//! Human-readable output for stdout.

use std::io::{self, Write};

use invocation::{InvocationResult, ProviderAddress, ServiceDescriptor, Target};

/// Prints providers with their indices, marking `selected` with `*`.
pub fn write_providers(
    out: &mut impl Write,
    service: &str,
    providers: &[ProviderAddress],
    selected: Option<usize>,
) -> io::Result<()> {
    writeln!(out, "{} provider(s) for {service}:", providers.len())?;
    let width = providers.len().saturating_sub(1).to_string().len();
    for (index, provider) in providers.iter().enumerate() {
        let marker = if selected == Some(index) { '*' } else { ' ' };
        writeln!(out, "{marker} [{index:>width$}] {}", provider.authority())?;
    }
    Ok(())
}

/// Prints the short-name → fully-qualified-name mapping.
pub fn write_services(out: &mut impl Write, services: &[ServiceDescriptor]) -> io::Result<()> {
    let width = services
        .iter()
        .map(|s| s.short_name.len())
        .max()
        .unwrap_or(0);
    for service in services {
        writeln!(
            out,
            "{:<width$}  {}",
            service.short_name, service.fully_qualified_name
        )?;
    }
    Ok(())
}

/// Reports where an invocation is going. The table is shown only when there
/// was a choice to make.
pub fn write_target(out: &mut impl Write, service: &str, target: &Target) -> io::Result<()> {
    if target.is_direct() {
        return writeln!(out, "Invoking {} directly", target.address());
    }
    if target.providers().len() > 1 {
        write_providers(out, service, target.providers(), Some(target.index()))?;
    }
    writeln!(out, "Invoking {}", target.address())
}

/// Prints the result body: pretty JSON when it parsed, raw text otherwise.
pub fn write_result(out: &mut impl Write, result: &InvocationResult) -> io::Result<()> {
    writeln!(out, "{}", result.display_text())
}

/// Summary line for stderr: decode warning and server timing.
pub fn result_notes(result: &InvocationResult) -> Vec<String> {
    let mut notes = Vec::new();
    if let Some(warning) = &result.warning {
        notes.push(format!("warning: {warning}"));
    }
    if let Some(elapsed) = result.server_elapsed {
        notes.push(format!("server elapsed: {} ms", elapsed.as_millis()));
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn addresses(n: usize) -> Vec<ProviderAddress> {
        (0..n)
            .map(|i| ProviderAddress::direct(format!("10.0.0.{i}"), 20880))
            .collect()
    }

    #[test]
    fn test_provider_table_marks_selection() {
        let text = render(|out| write_providers(out, "UserService", &addresses(2), Some(1)));
        assert_eq!(
            text,
            "2 provider(s) for UserService:\n  [0] 10.0.0.0:20880\n* [1] 10.0.0.1:20880\n"
        );
    }

    #[test]
    fn test_single_provider_target_skips_table() {
        let target = Target::resolved(addresses(1), 0).unwrap();
        let text = render(|out| write_target(out, "UserService", &target));
        assert_eq!(text, "Invoking 10.0.0.0:20880\n");
    }

    #[test]
    fn test_multi_provider_target_shows_table() {
        let target = Target::resolved(addresses(3), 2).unwrap();
        let text = render(|out| write_target(out, "UserService", &target));
        assert!(text.starts_with("3 provider(s)"));
        assert!(text.ends_with("Invoking 10.0.0.2:20880\n"));
    }

    #[test]
    fn test_services_are_aligned() {
        let services = vec![
            ServiceDescriptor {
                short_name: "A".to_string(),
                fully_qualified_name: "x.A".to_string(),
            },
            ServiceDescriptor {
                short_name: "Long".to_string(),
                fully_qualified_name: "x.Long".to_string(),
            },
        ];
        let text = render(|out| write_services(out, &services));
        assert_eq!(text, "A     x.A\nLong  x.Long\n");
    }

    #[test]
    fn test_result_prefers_pretty_text() {
        let result = invocation::decoder::decode(
            b"{\"b\":1,\"a\":2}\r\nelapsed: 7 ms\r\ndubbo>",
            invocation::TextEncoding::Utf8,
            "dubbo>",
        );
        let text = render(|out| write_result(out, &result));
        assert_eq!(text, "{\n    \"a\": 2,\n    \"b\": 1\n}\n");
        assert_eq!(result_notes(&result), vec!["server elapsed: 7 ms".to_string()]);
    }

    #[test]
    fn test_plain_result_carries_warning_note() {
        let result = invocation::decoder::decode(
            b"Unsupported command\r\ndubbo>",
            invocation::TextEncoding::Utf8,
            "dubbo>",
        );
        let text = render(|out| write_result(out, &result));
        assert_eq!(text, "Unsupported command\n");
        assert!(result_notes(&result)[0].starts_with("warning:"));
    }
}
