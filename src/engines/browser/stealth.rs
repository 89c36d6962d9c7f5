// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// Injected as an `add_script_to_evaluate_on_new_document` before every
/// document on a context, when `stealth` is enabled. Defeats the common
/// automation fingerprints without claiming to defeat all of them.
pub const STEALTH_INIT_SCRIPT: &str = r#"
(() => {
  Object.defineProperty(navigator, 'webdriver', { get: () => undefined });

  delete window.cdc_adoQpoasnfa76pfcZLmcfl_Array;
  delete window.cdc_adoQpoasnfa76pfcZLmcfl_Promise;
  delete window.cdc_adoQpoasnfa76pfcZLmcfl_Symbol;

  window.chrome = window.chrome || { runtime: {} };

  const originalQuery = window.navigator.permissions.query;
  window.navigator.permissions.query = (parameters) =>
    parameters.name === 'notifications'
      ? Promise.resolve({ state: Notification.permission })
      : originalQuery(parameters);

  Object.defineProperty(navigator, 'plugins', {
    get: () => [1, 2, 3, 4, 5],
  });
  Object.defineProperty(navigator, 'languages', {
    get: () => ['en-US', 'en'],
  });
  Object.defineProperty(navigator, 'platform', { get: () => 'Win32' });
  Object.defineProperty(navigator, 'hardwareConcurrency', { get: () => 8 });
  Object.defineProperty(navigator, 'deviceMemory', { get: () => 8 });
})();
"#;

pub const MOBILE_USER_AGENT: &str =
    "Mozilla/5.0 (iPhone; CPU iPhone OS 14_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0.3 Mobile/15E148 Safari/604.1";

pub const DESKTOP_VIEWPORT: (u32, u32) = (1920, 1080);
/// iPhone 12 logical viewport.
pub const MOBILE_VIEWPORT: (u32, u32) = (390, 844);
pub const MOBILE_DEVICE_SCALE_FACTOR: f64 = 3.0;
