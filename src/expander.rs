use thiserror::Error;

use crate::environment::Environment;
use crate::parser::default::is_name;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpandError {
    #[error("${{{0}}}: bad substitution")]
    BadSubstitution(String),
    #[error("$(({expr})): {reason}")]
    Arithmetic { expr: String, reason: &'static str },
}

/// Everything `$` substitution can read.
pub struct Expander<'a> {
    pub env: &'a Environment,
    pub last_status: i32,
    pub last_background: Option<u32>,
}

impl<'a> Expander<'a> {
    pub fn new(env: &'a Environment, last_status: i32, last_background: Option<u32>) -> Self {
        Expander {
            env,
            last_status,
            last_background,
        }
    }

    pub fn expand_all(&self, words: &[String]) -> Result<Vec<String>, ExpandError> {
        words.iter().map(|w| self.substitute(w)).collect()
    }

    /// Textual substitution of `$NAME`, `${NAME}`, `${NAME[i]}`, `$$`, `$?`, `$!`,
    /// `$#`, `$0`-`$9` and `$((a op b))`. Anything else after `$` stays literal.
    pub fn substitute(&self, text: &str) -> Result<String, ExpandError> {
        if !text.contains('$') {
            return Ok(text.to_string());
        }
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;

        while i < chars.len() {
            if chars[i] != '$' {
                out.push(chars[i]);
                i += 1;
                continue;
            }
            match chars.get(i + 1).copied() {
                Some('$') => {
                    out.push_str(&std::process::id().to_string());
                    i += 2;
                }
                Some('?') => {
                    out.push_str(&self.last_status.to_string());
                    i += 2;
                }
                Some('!') => {
                    if let Some(pid) = self.last_background {
                        out.push_str(&pid.to_string());
                    }
                    i += 2;
                }
                Some(c) if c == '#' || c.is_ascii_digit() => {
                    out.push_str(&self.env.lookup(&c.to_string()));
                    i += 2;
                }
                Some('(') if chars.get(i + 2) == Some(&'(') => {
                    let Some(close) = arithmetic_end(&chars, i + 3) else {
                        out.extend(&chars[i..]);
                        break;
                    };
                    let expr: String = chars[i + 3..close].iter().collect();
                    let value = self.arithmetic(&self.substitute(&expr)?)?;
                    out.push_str(&value.to_string());
                    i = close + 2;
                }
                Some('{') => {
                    let Some(offset) = chars[i + 2..].iter().position(|&c| c == '}') else {
                        out.extend(&chars[i..]);
                        break;
                    };
                    let inner: String = chars[i + 2..i + 2 + offset].iter().collect();
                    out.push_str(&self.braced(&inner)?);
                    i += offset + 3;
                }
                Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                    let len = chars[i + 1..]
                        .iter()
                        .take_while(|c| c.is_ascii_alphanumeric() || **c == '_')
                        .count();
                    let name: String = chars[i + 1..i + 1 + len].iter().collect();
                    out.push_str(&self.env.lookup(&name));
                    i += 1 + len;
                }
                _ => {
                    out.push('$');
                    i += 1;
                }
            }
        }
        Ok(out)
    }

    fn braced(&self, inner: &str) -> Result<String, ExpandError> {
        match inner {
            "?" => return Ok(self.last_status.to_string()),
            "$" => return Ok(std::process::id().to_string()),
            "#" => return Ok(self.env.lookup("#")),
            _ => {}
        }
        if is_name(inner) || (!inner.is_empty() && inner.chars().all(|c| c.is_ascii_digit())) {
            return Ok(self.env.lookup(inner));
        }

        let bad = || ExpandError::BadSubstitution(inner.to_string());
        let (name, rest) = inner.split_once('[').ok_or_else(bad)?;
        let index = rest.strip_suffix(']').ok_or_else(bad)?;
        if !is_name(name) {
            return Err(bad());
        }
        if index == "@" || index == "*" {
            return Ok(match self.env.get_array(name) {
                Some(items) => items.join(" "),
                None => self.env.lookup(name),
            });
        }
        let index: usize = self.substitute(index)?.trim().parse().map_err(|_| bad())?;
        match self.env.get_array_element(name, index) {
            Ok(value) => Ok(value.unwrap_or_default()),
            Err(_) => Ok(String::new()),
        }
    }

    /// One optional binary operator over integer literals or variable names.
    pub fn arithmetic(&self, expr: &str) -> Result<i64, ExpandError> {
        let fail = |reason| ExpandError::Arithmetic {
            expr: expr.to_string(),
            reason,
        };
        let trimmed = expr.trim();
        // Skip a leading sign so `-3 + 1` splits at the `+`.
        let body_start = usize::from(trimmed.starts_with(['-', '+']));
        let split = trimmed[body_start..]
            .find(['+', '-', '*', '/', '%'])
            .map(|p| p + body_start);

        let Some(at) = split else {
            return self.operand(trimmed).ok_or_else(|| fail("invalid operand"));
        };
        let op = trimmed[at..].chars().next().unwrap_or('+');
        let lhs = self.operand(&trimmed[..at]).ok_or_else(|| fail("invalid operand"))?;
        let rhs = self.operand(&trimmed[at + 1..]).ok_or_else(|| fail("invalid operand"))?;

        let result = match op {
            '+' => lhs.checked_add(rhs),
            '-' => lhs.checked_sub(rhs),
            '*' => lhs.checked_mul(rhs),
            '/' | '%' if rhs == 0 => return Err(fail("division by zero")),
            '/' => lhs.checked_div(rhs),
            _ => lhs.checked_rem(rhs),
        };
        result.ok_or_else(|| fail("integer overflow"))
    }

    fn operand(&self, text: &str) -> Option<i64> {
        let text = text.trim();
        if let Ok(n) = text.parse::<i64>() {
            return Some(n);
        }
        if !is_name(text) {
            return None;
        }
        let value = self.env.lookup(text);
        if value.trim().is_empty() {
            Some(0)
        } else {
            value.trim().parse().ok()
        }
    }
}

// Index of the first `)` of the closing `))`.
fn arithmetic_end(chars: &[char], from: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = from;
    while i < chars.len() {
        match chars[i] {
            '(' => depth += 1,
            ')' if depth == 0 && chars.get(i + 1) == Some(&')') => return Some(i),
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Environment {
        let env = Environment::detached();
        env.set("NAME", "world").unwrap();
        env.set("N", "4").unwrap();
        env.set("1", "first").unwrap();
        env.set("#", "1").unwrap();
        env.set_array("ARR", vec!["a".into(), "b".into(), "c".into()]).unwrap();
        env
    }

    fn sub(text: &str) -> String {
        let env = env();
        Expander::new(&env, 3, Some(4242)).substitute(text).unwrap()
    }

    #[test]
    fn test_plain_and_braced_names() {
        assert_eq!(sub("hello $NAME"), "hello world");
        assert_eq!(sub("${NAME}wide"), "worldwide");
        assert_eq!(sub("$NAMEwide"), "");
        assert_eq!(sub("a-$NAME-b"), "a-world-b");
    }

    #[test]
    fn test_unset_is_empty() {
        assert_eq!(sub("[$TINYSH_TEST_NOT_SET_ANYWHERE]"), "[]");
    }

    #[test]
    fn test_special_parameters() {
        assert_eq!(sub("$$"), std::process::id().to_string());
        assert_eq!(sub("status=$?"), "status=3");
        assert_eq!(sub("${?}"), "3");
        assert_eq!(sub("$!"), "4242");
        assert_eq!(sub("$1 of $#"), "first of 1");
        assert_eq!(sub("$2"), "");
    }

    #[test]
    fn test_literal_dollars() {
        assert_eq!(sub("cost: 5$"), "cost: 5$");
        assert_eq!(sub("$-x $ y"), "$-x $ y");
        assert_eq!(sub("${NAME"), "${NAME");
        assert_eq!(sub("no dollars"), "no dollars");
    }

    #[test]
    fn test_arrays() {
        assert_eq!(sub("${ARR[1]}"), "b");
        assert_eq!(sub("${ARR[9]}"), "");
        assert_eq!(sub("${ARR[@]}"), "a b c");
        assert_eq!(sub("$ARR"), "a");
        assert_eq!(sub("${ARR[$N]}"), "");
    }

    #[test]
    fn test_bad_substitution() {
        let env = env();
        let expander = Expander::new(&env, 0, None);
        assert_eq!(
            expander.substitute("${1bad}"),
            Err(ExpandError::BadSubstitution("1bad".into()))
        );
        assert_eq!(
            expander.substitute("${ARR[x]}"),
            Err(ExpandError::BadSubstitution("ARR[x]".into()))
        );
    }

    #[test]
    fn test_single_operator_arithmetic() {
        assert_eq!(sub("$((2 * 3))"), "6");
        assert_eq!(sub("$(($N + 1))"), "5");
        assert_eq!(sub("$((N-10))"), "-6");
        assert_eq!(sub("$((-3 + 1))"), "-2");
        assert_eq!(sub("$((17 % 5))"), "2");
        assert_eq!(sub("$((UNSET_COUNTER_XYZ + 1))"), "1");
        assert_eq!(sub("n=$((7))!"), "n=7!");
    }

    #[test]
    fn test_arithmetic_errors() {
        let env = env();
        let expander = Expander::new(&env, 0, None);
        assert!(matches!(
            expander.substitute("$((1 / 0))"),
            Err(ExpandError::Arithmetic { reason: "division by zero", .. })
        ));
        assert!(matches!(
            expander.substitute("$((1 + 2 + 3))"),
            Err(ExpandError::Arithmetic { reason: "invalid operand", .. })
        ));
    }
}
